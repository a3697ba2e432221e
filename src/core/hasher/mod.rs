//! # Hasher Module
//!
//! Whole-file SHA-256 content digests.
//!
//! Files are read in 4 MiB blocks so multi-gigabyte videos never need to be
//! held in memory. The digest depends only on the bytes, never on the path
//! or timestamps, which makes it the identity key for duplicate grouping.

use crate::error::HashError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Read block size
pub const CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Lowercase hex SHA-256 digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` hex characters, used in generated filenames
    pub fn prefix(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentHash {
    fn from(hex: &str) -> Self {
        ContentHash(hex.to_ascii_lowercase())
    }
}

/// Hash everything a reader yields
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<ContentHash> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }

    Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash a file's full content
pub fn hash_file(path: &Path) -> Result<ContentHash, HashError> {
    let file = File::open(path).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    hash_reader(file).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn empty_input_has_known_digest() {
        let hash = hash_reader(std::io::empty()).unwrap();
        assert_eq!(
            hash.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn identical_bytes_hash_identically_regardless_of_path() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("nested_b.png");
        fs::write(&a, b"same pixels").unwrap();
        fs::write(&b, b"same pixels").unwrap();

        assert_eq!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
        assert_eq!(hash_file(&a).unwrap(), hash_file(&a).unwrap());
    }

    #[test]
    fn different_bytes_hash_differently() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, b"one").unwrap();
        fs::write(&b, b"two").unwrap();

        assert_ne!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }

    #[test]
    fn content_larger_than_one_chunk() {
        let data = vec![7u8; CHUNK_SIZE + 123];
        let chunked = hash_reader(&data[..]).unwrap();
        let direct = format!("{:x}", Sha256::digest(&data));
        assert_eq!(chunked.as_str(), direct);
    }

    #[test]
    fn missing_file_is_an_error_with_path() {
        let err = hash_file(Path::new("/nonexistent/file.jpg")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/file.jpg"));
    }

    #[test]
    fn prefix_is_bounded() {
        let hash = ContentHash::from("ABCDEF");
        assert_eq!(hash.prefix(4), "abcd");
        assert_eq!(hash.prefix(16), "abcdef");
    }
}
