//! State checksums for change detection.
//!
//! Checksums feed a seed and a sequence of typed fields through SHA-256 and
//! keep the first eight bytes of the digest. Floats are hashed by their bit
//! pattern, so any change to persisted state changes the checksum.

use sha2::{Digest, Sha256};

/// Incremental checksum over typed fields.
#[derive(Clone)]
pub struct ChecksumBuilder {
    hasher: Sha256,
}

impl ChecksumBuilder {
    pub fn new(seed: u64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(seed.to_le_bytes());
        Self { hasher }
    }

    pub fn add_u64(mut self, value: u64) -> Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn add_f64(mut self, value: f64) -> Self {
        self.hasher.update(value.to_bits().to_le_bytes());
        self
    }

    /// Hash a value at single precision, for fields persisted as `f32`.
    pub fn add_f32(mut self, value: f64) -> Self {
        self.hasher.update((value as f32).to_bits().to_le_bytes());
        self
    }

    pub fn add_str(mut self, value: &str) -> Self {
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn finish(self) -> u64 {
        let digest = self.hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}
