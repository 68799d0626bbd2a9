//! Block: a run of stream bytes paired with their checksum.

use crate::checksum::Checksum;

/// Default maximum block size: 2 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 2 * 1024 * 1024;

/// An immutable chunk of data and the checksum of exactly those bytes.
///
/// Fields are private so the pairing can't drift after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: Vec<u8>,
    checksum: Checksum,
}

impl Block {
    /// Digest `data` and take ownership of it.
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let checksum = Checksum::from_data(&data);
        Self { data, checksum }
    }

    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Recompute the digest and compare it with the stored checksum.
    pub fn verify(&self) -> bool {
        Checksum::from_data(&self.data) == self.checksum
    }
}

impl AsRef<[u8]> for Block {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
