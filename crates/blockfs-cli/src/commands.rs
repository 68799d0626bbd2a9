//! CLI command implementations

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use blockfs::{BlockStore, Checksum, ExportError, FileStore, HashList, StoreConfig};

fn is_stdio(path: Option<&Path>) -> bool {
    path.map_or(true, |p| p == Path::new("-"))
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn Read>> {
    match path {
        Some(p) if !is_stdio(path) => {
            let file = File::open(p).with_context(|| format!("failed to open {}", p.display()))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(io::stdin().lock())),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => {
            let file =
                File::create(p).with_context(|| format!("failed to create {}", p.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn read_hash_list(path: Option<&Path>) -> Result<HashList> {
    let mut text = String::new();
    open_input(path)?
        .read_to_string(&mut text)
        .context("failed to read hash list")?;
    HashList::from_lines(&text).context("failed to parse hash list")
}

fn parse_checksum(s: &str) -> Result<Checksum> {
    s.parse()
        .with_context(|| format!("invalid checksum: '{}'", s))
}

/// Open an existing store without creating or modifying anything.
fn open_existing(config: StoreConfig) -> Result<FileStore> {
    let root = config.root.clone();
    FileStore::open(StoreConfig {
        read_only: true,
        ..config
    })
    .with_context(|| format!("no block store at {}", root.display()))
}

fn write_hash_list(out: &mut dyn Write, hashes: &HashList, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, hashes)?;
        writeln!(out)?;
    } else {
        out.write_all(hashes.to_lines().as_bytes())?;
    }
    out.flush()?;
    Ok(())
}

/// Create the store directories and print the block directory
pub fn init(config: StoreConfig) -> Result<()> {
    let store = FileStore::open(config)?;
    println!("{}", store.blocks_dir().display());
    Ok(())
}

/// Chunk a stream into the store and print its hash list
///
/// On failure the blocks stored before the error are still printed, so the
/// caller can resume or inspect what made it in.
pub fn export(
    config: StoreConfig,
    input: Option<&Path>,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let store = FileStore::open(config)?;
    let reader = open_input(input)?;
    let mut out = open_output(output)?;

    match store.chunker().export(reader) {
        Ok(hashes) => {
            write_hash_list(&mut *out, &hashes, json)?;
            tracing::info!(blocks = hashes.len(), "exported stream");
            Ok(())
        }
        Err(err) => {
            let ExportError { hashes, source } = err;
            write_hash_list(&mut *out, &hashes, json)?;
            Err(source).with_context(|| {
                format!("export stopped after {} stored block(s)", hashes.len())
            })
        }
    }
}

/// Reassemble a stream from a hash list
pub fn restore(config: StoreConfig, list: Option<&Path>, output: Option<&Path>) -> Result<()> {
    let store = open_existing(config)?;
    let hashes = read_hash_list(list)?;
    let out = open_output(output)?;

    let written = store
        .chunker()
        .restore(&hashes, out)
        .context("restore failed")?;
    tracing::info!(blocks = hashes.len(), bytes = written, "restored stream");
    Ok(())
}

/// Write a single block's bytes to stdout
pub fn cat(config: StoreConfig, checksum: &str) -> Result<()> {
    let checksum = parse_checksum(checksum)?;
    let store = open_existing(config)?;
    let block = store.read(&checksum)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(block.data())?;
    stdout.flush()?;
    Ok(())
}

/// Print `<checksum> present|missing` for each argument
pub fn exists(config: StoreConfig, checksums: &[String]) -> Result<()> {
    let checksums = checksums
        .iter()
        .map(|s| parse_checksum(s))
        .collect::<Result<Vec<_>>>()?;
    let store = open_existing(config)?;

    for checksum in checksums {
        let state = if store.exists(&checksum) {
            "present"
        } else {
            "missing"
        };
        println!("{} {}", checksum, state);
    }
    Ok(())
}

/// Print the checksums of a hash list that the store doesn't hold
pub fn missing(config: StoreConfig, list: Option<&Path>) -> Result<()> {
    let store = open_existing(config)?;
    let hashes = read_hash_list(list)?;
    let missing = store.missing_blocks(&hashes);

    tracing::debug!(
        candidates = hashes.len(),
        missing = missing.len(),
        "computed missing set"
    );
    write_hash_list(&mut io::stdout().lock(), &missing, false)
}

/// Print every stored checksum
pub fn list(config: StoreConfig) -> Result<()> {
    let store = open_existing(config)?;
    let checksums: HashList = store.list()?.into();
    write_hash_list(&mut io::stdout().lock(), &checksums, false)
}
