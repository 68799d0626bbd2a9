//! Checksum: the BLAKE3-256 digest of a block, as 64 lowercase hex chars.
//!
//! The checksum is both the dedup key and the filename a block is stored
//! under, so it is always derived from content and nothing else.
//!
//! [`HashList`] is an ordered sequence of checksums. Concatenating the blocks
//! it names, in order, reproduces the stream they were cut from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of a checksum in hex characters (32 bytes of BLAKE3).
pub const CHECKSUM_HEX_LEN: usize = 64;

/// A block checksum - 256 bits (32 bytes, 64 hex chars) of BLAKE3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum(String);

/// Errors that can occur when parsing a checksum from text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("invalid checksum length: expected 64 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in checksum")]
    InvalidHex,
}

impl Checksum {
    /// Digest data and return its checksum.
    pub fn from_data(data: &[u8]) -> Self {
        Self::from_hash(&blake3::hash(data))
    }

    /// Wrap a finished BLAKE3 digest, e.g. from a streaming `Hasher`.
    pub fn from_hash(hash: &blake3::Hash) -> Self {
        Self(hash.to_hex().to_string())
    }

    /// Create from an existing checksum string (validates format).
    pub fn from_str_checked(s: &str) -> Result<Self, ChecksumError> {
        if s.len() != CHECKSUM_HEX_LEN {
            return Err(ChecksumError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ChecksumError::InvalidHex);
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Raw digest bytes.
    pub fn to_bytes(&self) -> Result<[u8; 32], ChecksumError> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(&self.0, &mut out)
            .map(|()| out)
            .map_err(|_| ChecksumError::InvalidHex)
    }

    /// First 12 hex chars, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }

    /// Get the full checksum as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Checksum {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}

impl TryFrom<String> for Checksum {
    type Error = ChecksumError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str_checked(&s)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.0
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered list of checksums describing a stream.
///
/// Duplicates are meaningful: a stream that repeats a block references the
/// same checksum twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashList(Vec<Checksum>);

impl HashList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, checksum: Checksum) {
        self.0.push(checksum);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Checksum> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Checksum] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Checksum> {
        self.0
    }

    /// Render as text, one checksum per line.
    pub fn to_lines(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * (CHECKSUM_HEX_LEN + 1));
        for checksum in &self.0 {
            out.push_str(checksum.as_str());
            out.push('\n');
        }
        out
    }

    /// Parse the line-oriented text form. Blank lines are skipped.
    pub fn from_lines(text: &str) -> Result<Self, ChecksumError> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Checksum::from_str_checked)
            .collect()
    }
}

impl From<Vec<Checksum>> for HashList {
    fn from(checksums: Vec<Checksum>) -> Self {
        Self(checksums)
    }
}

impl FromIterator<Checksum> for HashList {
    fn from_iter<I: IntoIterator<Item = Checksum>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for HashList {
    type Item = Checksum;
    type IntoIter = std::vec::IntoIter<Checksum>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a HashList {
    type Item = &'a Checksum;
    type IntoIter = std::slice::Iter<'a, Checksum>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_data_produces_64_hex_chars() {
        let checksum = Checksum::from_data(b"Hello, World!");
        assert_eq!(checksum.as_str().len(), CHECKSUM_HEX_LEN);
        assert!(checksum.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_from_data_is_deterministic() {
        let a = Checksum::from_data(b"test data");
        let b = Checksum::from_data(b"test data");
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_data_different_input_different_checksum() {
        let a = Checksum::from_data(b"data a");
        let b = Checksum::from_data(b"data b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_matches_blake3_reference() {
        let checksum = Checksum::from_data(b"");
        assert_eq!(
            checksum.as_str(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn test_to_bytes_matches_hex() {
        let checksum = Checksum::from_data(b"bytes");
        let bytes = checksum.to_bytes().unwrap();
        assert_eq!(hex::encode(bytes), checksum.as_str());
        assert_eq!(&bytes, blake3::hash(b"bytes").as_bytes());
    }

    #[test]
    fn test_from_str_normalizes_case() {
        let upper = "AF1349B9F5F9A1A6A0404DEA36DCC9499BCB25C9ADC112B7CC9A93CAE41F3262";
        let checksum: Checksum = upper.parse().unwrap();
        assert_eq!(checksum, Checksum::from_data(b""));
    }

    #[test]
    fn test_from_str_invalid_length() {
        let result: Result<Checksum, _> = "short".parse();
        assert_eq!(result, Err(ChecksumError::InvalidLength(5)));
    }

    #[test]
    fn test_from_str_invalid_hex() {
        let result: Result<Checksum, _> = "z".repeat(64).parse();
        assert_eq!(result, Err(ChecksumError::InvalidHex));
    }

    #[test]
    fn test_serde_rejects_malformed() {
        let result: Result<Checksum, _> = serde_json::from_str("\"not-a-checksum\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_hash_list_serializes_as_array() {
        let list: HashList = vec![Checksum::from_data(b"a"), Checksum::from_data(b"b")].into();
        let json = serde_json::to_string(&list).unwrap();
        assert!(json.starts_with("[\""));
        let restored: HashList = serde_json::from_str(&json).unwrap();
        assert_eq!(list, restored);
    }

    #[test]
    fn test_hash_list_lines() {
        let list: HashList = vec![
            Checksum::from_data(b"one"),
            Checksum::from_data(b"two"),
            Checksum::from_data(b"one"),
        ]
        .into();

        let text = list.to_lines();
        assert_eq!(text.lines().count(), 3);

        let padded = format!("\n{}\n\n", text);
        assert_eq!(HashList::from_lines(&padded).unwrap(), list);
    }

    #[test]
    fn test_hash_list_lines_rejects_garbage() {
        assert!(HashList::from_lines("abc\n").is_err());
    }
}
