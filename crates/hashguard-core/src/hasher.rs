use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::error::Error;
use crate::signatures::Fingerprint;

const CHUNK_SIZE: usize = 8 * 1024;

/// Streams a file through SHA-256 in fixed-size chunks, so memory use does
/// not depend on file size.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileHasher;

impl FileHasher {
    pub fn new() -> Self {
        Self
    }

    pub fn hash(&self, path: &Path) -> Result<Fingerprint, Error> {
        hash_file(path).map_err(|source| Error::UnreadableFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn hash_file(path: &Path) -> io::Result<Fingerprint> {
    let mut file = File::open(path)?;
    if !file.metadata()?.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        ));
    }
    hash_reader(&mut file)
}

pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<Fingerprint> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(Fingerprint::from_bytes(hasher.finalize().into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_known_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        fs::write(&path, "abc").unwrap();

        let fp = FileHasher::new().hash(&path).unwrap();
        assert_eq!(
            fp.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_is_deterministic_across_chunks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &content).unwrap();

        let hasher = FileHasher::new();
        let first = hasher.hash(&path).unwrap();
        let second = hasher.hash(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, hash_reader(&mut content.as_slice()).unwrap());
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let err = FileHasher::new().hash(&dir.path().join("gone")).unwrap_err();
        assert!(matches!(err, Error::UnreadableFile { .. }));
    }

    #[test]
    fn test_directory_is_unreadable() {
        let dir = tempdir().unwrap();
        let err = FileHasher::new().hash(dir.path()).unwrap_err();
        assert!(matches!(err, Error::UnreadableFile { .. }));
    }
}
