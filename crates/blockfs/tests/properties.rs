//! End-to-end behaviour of chunking, storage and missing-set negotiation
//! against a real directory.

use std::fs;
use std::io::{Cursor, Write};

use anyhow::Result;
use blockfs::store::TEMP_PREFIX;
use blockfs::{Block, BlockStore, Checksum, Chunker, Error, FileStore, HashList, StoreConfig};
use tempfile::TempDir;

const MIB: usize = 1024 * 1024;

/// Deterministic bytes from the BLAKE3 output stream.
fn pseudo_random(seed: u64, len: usize) -> Vec<u8> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    let mut out = vec![0u8; len];
    hasher.finalize_xof().fill(&mut out);
    out
}

fn store_with_block_size(dir: &TempDir, block_size: usize) -> Result<FileStore> {
    Ok(FileStore::open(
        StoreConfig::with_root(dir.path()).block_size(block_size),
    )?)
}

fn restore(store: &FileStore, hashes: &HashList) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    store.chunker().restore(hashes, &mut out)?;
    Ok(out)
}

fn file_count(store: &FileStore) -> Result<usize> {
    Ok(fs::read_dir(store.blocks_dir())?.count())
}

#[test]
fn round_trip_across_lengths() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let block_size = 1024;
    let store = store_with_block_size(&temp_dir, block_size)?;

    for (seed, len) in [
        0,
        1,
        block_size - 1,
        block_size,
        block_size + 1,
        3 * block_size,
        3 * block_size + 17,
    ]
    .into_iter()
    .enumerate()
    {
        let data = pseudo_random(seed as u64, len);
        let hashes = store.chunker().export(Cursor::new(&data))?;

        assert_eq!(hashes.len(), len.div_ceil(block_size), "len {len}");
        assert_eq!(restore(&store, &hashes)?, data, "len {len}");

        for (i, checksum) in hashes.iter().enumerate() {
            let block = store.read(checksum)?;
            if i + 1 < hashes.len() {
                assert_eq!(block.len(), block_size);
            } else {
                assert!(!block.is_empty() && block.len() <= block_size);
            }
        }
    }
    Ok(())
}

#[test]
fn export_is_idempotent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = store_with_block_size(&temp_dir, 4096)?;
    let data = pseudo_random(7, 4096 * 5 + 100);

    let first = store.chunker().export(Cursor::new(&data))?;
    let files_after_first = file_count(&store)?;

    let second = store.chunker().export(Cursor::new(&data))?;
    assert_eq!(first, second);
    assert_eq!(file_count(&store)?, files_after_first);
    assert_eq!(files_after_first, 6);
    Ok(())
}

#[test]
fn checksums_follow_content() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let block_size = 512;
    let store = store_with_block_size(&temp_dir, block_size)?;

    let base = pseudo_random(1, block_size * 4 + 33);
    let mut altered = base.clone();
    // Flip one byte in the third window only.
    altered[block_size * 2 + 5] ^= 0xff;

    let a = store.chunker().export(Cursor::new(&base))?;
    let b = store.chunker().export(Cursor::new(&altered))?;

    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        if i == 2 {
            assert_ne!(x, y);
        } else {
            assert_eq!(x, y);
        }
    }

    for checksum in a.iter().chain(b.iter()) {
        let block = store.read(checksum)?;
        assert_eq!(&Checksum::from_data(block.data()), checksum);
    }
    Ok(())
}

#[test]
fn unrelated_streams_share_no_blocks() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = store_with_block_size(&temp_dir, 256)?;

    let mut seen = std::collections::HashSet::new();
    for seed in 0..20u64 {
        let data = pseudo_random(1000 + seed, 256 * 3 + seed as usize);
        for checksum in store.chunker().export(Cursor::new(&data))? {
            assert!(seen.insert(checksum), "collision at seed {seed}");
        }
    }
    Ok(())
}

#[test]
fn missing_blocks_is_ordered_difference() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = store_with_block_size(&temp_dir, 64)?;

    let blocks: Vec<Block> = (0..8u64).map(|i| Block::new(pseudo_random(i, 64))).collect();
    let candidates: HashList = blocks.iter().map(|b| b.checksum().clone()).collect();

    // Store every third block.
    for block in blocks.iter().step_by(3) {
        store.write(block)?;
    }

    let expected: HashList = blocks
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 0)
        .map(|(_, b)| b.checksum().clone())
        .collect();

    assert_eq!(store.missing_blocks(&candidates), expected);
    Ok(())
}

#[test]
fn uncommitted_write_is_absent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = FileStore::at_path(temp_dir.path())?;
    let block = Block::new(pseudo_random(3, 10_000));

    let mut pending = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(store.blocks_dir())?;
    pending.write_all(&block.data()[..5_000])?;
    pending.flush()?;

    assert!(!store.exists(block.checksum()));
    assert!(store.read(block.checksum()).unwrap_err().is_not_found());
    let candidates: HashList = vec![block.checksum().clone()].into();
    assert_eq!(store.missing_blocks(&candidates), candidates);

    // Abandoning the write leaves nothing behind.
    drop(pending);
    assert_eq!(file_count(&store)?, 0);
    Ok(())
}

#[test]
fn five_mebibytes_in_two_mebibyte_blocks() -> Result<()> {
    let data = pseudo_random(42, 5 * MIB);

    let empty_dir = TempDir::new()?;
    let empty = FileStore::at_path(empty_dir.path())?;

    let temp_dir = TempDir::new()?;
    let store = FileStore::at_path(temp_dir.path())?;
    assert_eq!(store.block_size(), 2 * MIB);

    let hashes = store.chunker().export(Cursor::new(&data))?;
    assert_eq!(hashes.len(), 3);

    let sizes: Vec<usize> = hashes
        .iter()
        .map(|c| store.read(c).map(|b| b.len()))
        .collect::<blockfs::Result<_>>()?;
    assert_eq!(sizes, vec![2 * MIB, 2 * MIB, MIB]);

    let again = store.chunker().export(Cursor::new(&data))?;
    assert_eq!(again, hashes);

    assert_eq!(empty.missing_blocks(&hashes), hashes);
    assert!(store.missing_blocks(&hashes).is_empty());

    assert_eq!(restore(&store, &hashes)?, data);
    Ok(())
}

#[test]
fn every_exported_checksum_is_readable() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = store_with_block_size(&temp_dir, 8)?;
    let data = pseudo_random(11, 16);

    // Neither constructor can cut windows the store won't read back.
    for chunker in [Chunker::new(&store), Chunker::with_block_size(&store, 4096)] {
        let hashes = chunker.export(Cursor::new(&data))?;
        assert_eq!(hashes.len(), 2);
        for checksum in &hashes {
            assert_eq!(store.read(checksum)?.len(), 8);
        }
        assert_eq!(restore(&store, &hashes)?, data);
    }
    Ok(())
}

#[test]
fn reopening_with_smaller_block_size_keeps_blocks_intact() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let data = pseudo_random(12, 4096);

    let store = FileStore::at_path(temp_dir.path())?;
    let hashes = store.chunker().export(Cursor::new(&data))?;
    assert_eq!(hashes.len(), 1);

    let reopened = store_with_block_size(&temp_dir, 1024)?;
    let err = reopened.read(&hashes.as_slice()[0]).unwrap_err();
    assert!(
        matches!(err, Error::TooLarge { size: 4096, limit: 1024, .. }),
        "got {err:?}"
    );
    assert!(reopened.missing_blocks(&hashes).is_empty());

    // New exports under the smaller limit still round-trip.
    let smaller = reopened.chunker().export(Cursor::new(&data))?;
    assert_eq!(smaller.len(), 4);
    assert_eq!(restore(&reopened, &smaller)?, data);

    // And the original store still serves the big block unchanged.
    let original = FileStore::at_path(temp_dir.path())?;
    assert_eq!(restore(&original, &hashes)?, data);
    Ok(())
}
