//! Package archive extraction
//!
//! Packages ship as gzipped tarballs. Extraction rejects any entry whose
//! normalized path is absolute or climbs out of the destination, so a
//! hostile archive cannot write outside its scratch directory.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use tar::Archive;

/// Whether a path looks like a package archive
pub fn is_archive(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

/// Normalize an archive entry path, rejecting traversal
fn sanitize_entry_path(path: &Path) -> Result<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                anyhow::bail!("archive entry escapes destination: {}", path.display());
            }
            Component::CurDir => {}
            Component::Normal(part) => cleaned.push(part),
        }
    }
    if cleaned.as_os_str().is_empty() {
        anyhow::bail!("archive entry has empty path");
    }
    Ok(cleaned)
}

/// Extract a `.tar.gz`/`.tgz` archive into `dest_dir`
///
/// Every entry path is sanitized before anything is written; the first bad
/// entry aborts the whole extraction.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file =
        File::open(archive_path).with_context(|| format!("open {}", archive_path.display()))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    for entry in archive.entries().context("read tar entries")? {
        let mut entry = entry.context("read tar entry")?;
        let raw_path = entry.path().context("read tar path")?.to_path_buf();
        let rel = sanitize_entry_path(&raw_path)?;
        let out = dest_dir.join(&rel);

        if entry.header().entry_type().is_dir() {
            fs::create_dir_all(&out).with_context(|| format!("create {}", out.display()))?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            entry
                .unpack(&out)
                .with_context(|| format!("extract {}", out.display()))?;
        }
    }

    Ok(())
}

/// The effective package root of an extracted archive
///
/// When the archive root holds exactly one directory (ignoring metadata
/// dotfiles), that directory is the package root; otherwise the extraction
/// directory itself is.
pub fn effective_root(extract_dir: &Path) -> Result<PathBuf> {
    let mut dirs = Vec::new();
    let mut has_regular_files = false;

    for entry in
        fs::read_dir(extract_dir).with_context(|| format!("read {}", extract_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        } else {
            has_regular_files = true;
        }
    }

    if !has_regular_files && dirs.len() == 1 {
        return Ok(dirs.remove(0));
    }
    Ok(extract_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    /// Build a small .tar.gz with the given (entry name, contents) pairs
    fn write_tarball(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
        let file = File::create(path)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for (name, contents) in entries {
            let bytes = contents.as_bytes();
            let mut header = tar::Header::new_gnu();
            header.set_size(bytes.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, bytes)?;
        }

        builder.into_inner()?.finish()?;
        Ok(())
    }

    #[test]
    fn test_extract_and_single_root() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let archive = dir.path().join("demo.tar.gz");
        if write_tarball(
            &archive,
            &[
                ("demo/plugin.toml", "[plugin]\nname = \"demo\"\n"),
                ("demo/skills/hello.md", "hi"),
            ],
        )
        .is_err()
        {
            return;
        }

        let dest = dir.path().join("out");
        if fs::create_dir_all(&dest).is_err() {
            return;
        }
        assert!(extract_tar_gz(&archive, &dest).is_ok());

        let root = effective_root(&dest).unwrap_or_default();
        assert_eq!(root, dest.join("demo"));
        assert!(root.join("plugin.toml").is_file());
        assert!(root.join("skills/hello.md").is_file());
    }

    #[test]
    fn test_traversal_entry_rejected_and_nothing_extracted() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        let archive = dir.path().join("evil.tar.gz");
        if write_tarball(&archive, &[("../../evil", "boom")]).is_err() {
            return;
        }

        let dest = dir.path().join("out");
        if fs::create_dir_all(&dest).is_err() {
            return;
        }

        let result = extract_tar_gz(&archive, &dest);
        assert!(result.is_err_and(|e| e.to_string().contains("escapes destination")));

        let leftover = fs::read_dir(&dest).map(Iterator::count).unwrap_or(0);
        assert_eq!(leftover, 0);
        assert!(!dir.path().join("evil").exists());
    }

    #[test]
    fn test_effective_root_with_flat_archive() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::write(dir.path().join("plugin.toml"), "").is_err() {
            return;
        }
        let root = effective_root(dir.path()).unwrap_or_default();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn test_effective_root_ignores_dotfiles() {
        let Ok(dir) = TempDir::new() else {
            return;
        };
        if fs::create_dir_all(dir.path().join("demo")).is_err() {
            return;
        }
        if fs::write(dir.path().join(".DS_Store"), "meta").is_err() {
            return;
        }
        let root = effective_root(dir.path()).unwrap_or_default();
        assert_eq!(root, dir.path().join("demo"));
    }

    #[test]
    fn test_is_archive() {
        assert!(is_archive(Path::new("demo-1.0.0.tar.gz")));
        assert!(is_archive(Path::new("demo.TGZ")));
        assert!(!is_archive(Path::new("demo.zip")));
        assert!(!is_archive(Path::new("demo")));
    }
}
