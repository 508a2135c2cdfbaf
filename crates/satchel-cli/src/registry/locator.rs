//! Locator parsing for package sources and registries
//!
//! Recognized direct-locator shapes: local paths (plain, `~/...` or
//! `file://`), plain `http://`/`https://` URLs, object storage (`s3://`,
//! `az://`) and version control (`git+...`, optionally suffixed `@ref`).

use std::path::{Path, PathBuf};

/// A parsed locator, normalized for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Local directory or archive on disk
    Path(PathBuf),
    /// Plain http/https URL to an archive or registry base
    Http(String),
    /// Object storage URL (s3:// or az://)
    ObjectStorage(String),
    /// Git repository, with an optional `@ref` (branch, tag or commit)
    Git {
        url: String,
        reference: Option<String>,
    },
}

/// Expand tilde (~) to home directory path (cross-platform)
pub fn expand_tilde(path: &str) -> String {
    if !path.starts_with('~') {
        return path.to_string();
    }

    match dirs::home_dir() {
        Some(home) => {
            let home_str = home.to_string_lossy();
            if path == "~" {
                home_str.to_string()
            } else if path.starts_with("~/") {
                format!("{}{}", home_str, &path[1..])
            } else {
                // ~someuser paths are not supported, return as-is
                path.to_string()
            }
        }
        None => path.to_string(),
    }
}

/// Whether a string is a fully-qualified locator rather than a bare name
///
/// Used to decide if a `registry` field is a literal URL or a named entry
/// in the project's registry table.
pub fn is_locator(raw: &str) -> bool {
    raw.starts_with("file://")
        || raw.starts_with("http://")
        || raw.starts_with("https://")
        || raw.starts_with("s3://")
        || raw.starts_with("az://")
        || raw.starts_with("git+")
        || raw.starts_with('/')
        || raw.starts_with("./")
        || raw.starts_with("../")
        || raw.starts_with('~')
}

/// Parse a locator string, resolving relative paths against `base_dir`
pub fn parse(raw: &str, base_dir: &Path) -> Option<Locator> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Some(rest) = raw.strip_prefix("git+") {
        let (url, reference) = split_git_ref(rest);
        return Some(Locator::Git {
            url: url.to_string(),
            reference,
        });
    }

    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Some(Locator::Http(raw.to_string()));
    }

    if raw.starts_with("s3://") || raw.starts_with("az://") {
        return Some(Locator::ObjectStorage(raw.to_string()));
    }

    if let Some(rest) = raw.strip_prefix("file://") {
        return Some(Locator::Path(PathBuf::from(rest)));
    }

    if is_locator(raw) {
        let expanded = expand_tilde(raw);
        let path = PathBuf::from(&expanded);
        let resolved = if path.is_absolute() {
            path
        } else {
            base_dir.join(path)
        };
        return Some(Locator::Path(resolved));
    }

    None
}

/// Split an optional trailing `@ref` off a git URL
///
/// The `@` only counts as a ref separator when it follows the last path
/// segment, so `git@github.com:org/repo` keeps its user prefix intact.
fn split_git_ref(url: &str) -> (&str, Option<String>) {
    if let Some(at) = url.rfind('@') {
        let last_slash = url.rfind('/').unwrap_or(0);
        if at > last_slash {
            return (&url[..at], Some(url[at + 1..].to_string()));
        }
    }
    (url, None)
}

/// Display string for a parsed locator (used for lock entries)
pub fn to_locator_string(locator: &Locator) -> String {
    match locator {
        Locator::Path(path) => path.to_string_lossy().to_string(),
        Locator::Http(url) | Locator::ObjectStorage(url) => url.clone(),
        Locator::Git { url, reference } => match reference {
            Some(r) => format!("git+{url}@{r}"),
            None => format!("git+{url}"),
        },
    }
}
