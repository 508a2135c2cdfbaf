//! Content integrity digests (sha256, hex)

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Digest of a byte buffer
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Digest of a file's contents
pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(sha256_bytes(&bytes))
}

/// Digest of a directory tree: relative paths and file bytes, in sorted
/// order, so the same content always digests the same regardless of
/// filesystem iteration order
pub fn sha256_dir(dir: &Path) -> Result<String> {
    let mut hasher = Sha256::new();

    let mut files: Vec<_> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();

    for path in files {
        let rel = path.strip_prefix(dir).unwrap_or(&path);
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update([0]);
        let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        hasher.update(&bytes);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bytes_digest_is_stable() {
        assert_eq!(sha256_bytes(b"demo"), sha256_bytes(b"demo"));
        assert_ne!(sha256_bytes(b"demo"), sha256_bytes(b"other"));
    }

    #[test]
    fn test_dir_digest_tracks_content() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("a.md"), "alpha").is_err() {
            return;
        }

        let Ok(first) = sha256_dir(dir.path()) else {
            return;
        };
        let Ok(second) = sha256_dir(dir.path()) else {
            return;
        };
        assert_eq!(first, second);

        if fs::write(dir.path().join("a.md"), "changed").is_err() {
            return;
        }
        let third = sha256_dir(dir.path()).unwrap_or_default();
        assert_ne!(first, third);
    }
}
