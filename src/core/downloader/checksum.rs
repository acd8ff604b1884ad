use std::fs::File;
use std::io::Read;
use std::path::Path;

use md5::Md5;
use sha1::{Digest, Sha1};
use tracing::warn;

use crate::core::error::{InstallerError, InstallerResult};

/// Hex SHA-1 of a file, streamed in chunks.
pub fn sha1_file(path: &Path) -> InstallerResult<String> {
    let mut file = File::open(path).map_err(|e| InstallerError::io(path, e))?;
    let mut hasher = Sha1::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).map_err(|e| InstallerError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha1_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

pub fn md5_bytes(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

/// Check `path` against a declared sha1.
///
/// A matching file is kept. A mismatching one is deleted and the mismatch
/// reported, so no corrupt file survives under its final name.
pub fn verify_or_delete(path: &Path, expected: &str) -> InstallerResult<()> {
    let actual = sha1_file(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        return Ok(());
    }

    warn!(
        "Checksum mismatch for {:?}: expected {}, got {}",
        path, expected, actual
    );
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Failed to delete corrupt file {:?}: {}", path, e);
    }
    Err(InstallerError::ChecksumMismatch {
        path: path.to_path_buf(),
        expected: expected.to_string(),
        actual,
    })
}

/// An existing file is valid when it matches its checksum, or when no checksum
/// is declared at all.
///
/// Mismatching files are deleted; this never fails on a mismatch.
pub fn existing_file_is_valid(path: &Path, expected: Option<&str>) -> InstallerResult<bool> {
    if !path.is_file() {
        return Ok(false);
    }
    match expected {
        None => Ok(true),
        Some(sha1) => match verify_or_delete(path, sha1) {
            Ok(()) => Ok(true),
            Err(InstallerError::ChecksumMismatch { .. }) => Ok(false),
            Err(e) => Err(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sha1_of_known_content() {
        assert_eq!(
            sha1_bytes(b"hello"),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
        assert_eq!(md5_bytes(b"hello"), "5d41402abc4b2a76b9719d911017c592");
    }

    #[test]
    fn sha1_file_matches_in_memory_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data.bin");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();
        assert_eq!(sha1_file(&path).unwrap(), sha1_bytes(&content));
    }

    #[test]
    fn mismatching_file_is_deleted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("foo.jar");
        std::fs::write(&path, b"corrupt").unwrap();

        let err = verify_or_delete(&path, "abc123").unwrap_err();
        assert!(matches!(err, InstallerError::ChecksumMismatch { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn unchecksummed_existing_file_is_trusted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("foo.jar");
        std::fs::write(&path, b"anything").unwrap();
        assert!(existing_file_is_valid(&path, None).unwrap());
        assert!(!existing_file_is_valid(&temp.path().join("missing.jar"), None).unwrap());
    }

    #[test]
    fn checksum_comparison_ignores_case() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();
        assert!(existing_file_is_valid(
            &path,
            Some("AAF4C61DDCC5E8A2DABEDE0F3B482CD9AEA9434D")
        )
        .unwrap());
    }
}
