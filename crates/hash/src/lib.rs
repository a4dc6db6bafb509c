#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Fragment hashing (§3).
//!
//! The spec requires a cryptographic hash with at least 512-bit output.
//! BLAKE3's default digest is 256 bits, so this crate drives BLAKE3 in
//! extendable-output (XOF) mode for a 64-byte (512-bit) digest — still the
//! teacher's hashing primitive, just not its default truncation.

mod tree;

pub use tree::hash_directory;

use fragmenter_errors::{FragmenterError, io_error_with_path};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

const CHUNK_SIZE: usize = 64 * 1024;
const DIGEST_LEN: usize = 64;

/// A 512-bit fragment/content hash, stored hex-encoded on the wire (§3).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Hash([u8; DIGEST_LEN]);

impl Hash {
    #[must_use]
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// # Errors
    /// Returns an error if `s` is not valid hex or is the wrong length.
    pub fn from_hex(s: &str) -> Result<Self, FragmenterError> {
        let bytes = hex::decode(s)
            .map_err(|e| FragmenterError::invalid_parameters(format!("invalid hex hash: {e}")))?;
        if bytes.len() != DIGEST_LEN {
            return Err(FragmenterError::invalid_parameters(format!(
                "hash must be {DIGEST_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut array = [0u8; DIGEST_LEN];
        array.copy_from_slice(&bytes);
        Ok(Self(array))
    }

    /// Hash of a single byte slice: `H(data)`.
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(data);
        Self::finalize(hasher)
    }

    /// Hash of several concatenated byte slices, without materialising the
    /// concatenation: `H(a || b || ...)`.
    #[must_use]
    pub fn from_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Self::finalize(hasher)
    }

    /// Hash of an open file's contents: `H(file_bytes)`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub async fn hash_file(path: &Path) -> Result<Self, FragmenterError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| io_error_with_path(&e, path))?;
        Self::hash_reader(file).await
    }

    async fn hash_reader<R: AsyncRead + Unpin>(mut reader: R) -> Result<Self, FragmenterError> {
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
        Ok(Self::finalize(hasher))
    }

    fn finalize(hasher: blake3::Hasher) -> Self {
        let mut digest = [0u8; DIGEST_LEN];
        hasher.finalize_xof().fill(&mut digest);
        Self(digest)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
