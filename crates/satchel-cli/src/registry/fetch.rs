//! Turning a locator into a package directory on disk
//!
//! Local directories are used in place; local archives are extracted into
//! the run's scratch space; remote locators are downloaded (or cloned, or
//! copied via the cloud CLI) into scratch first. The returned integrity
//! digest covers the fetched bytes: the archive for archive-shaped sources,
//! the tree for directory-shaped ones.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use satchel_logger as logger;

use super::archive;
use super::integrity;
use super::locator::Locator;

/// A fetched package: where the source tree lives and what its bytes hash to
#[derive(Debug, Clone)]
pub struct FetchedSource {
    pub dir: PathBuf,
    pub integrity: String,
}

/// Fetch the package a locator names into `scratch`
///
/// `label` seeds scratch subdirectory names so parallel-fetched plugins in
/// one run never collide.
pub fn fetch_locator(locator: &Locator, scratch: &Path, label: &str) -> Result<FetchedSource> {
    match locator {
        Locator::Path(path) => fetch_local(path, scratch, label),
        Locator::Http(url) => fetch_http(url, scratch, label),
        Locator::Git { url, reference } => fetch_git(url, reference.as_deref(), scratch, label),
        Locator::ObjectStorage(url) => fetch_object_storage(url, scratch, label),
    }
}

fn fetch_local(path: &Path, scratch: &Path, label: &str) -> Result<FetchedSource> {
    if path.is_dir() {
        // Used as-is, no copy
        let integrity = integrity::sha256_dir(path)?;
        return Ok(FetchedSource {
            dir: path.to_path_buf(),
            integrity,
        });
    }

    if path.is_file() && archive::is_archive(path) {
        let integrity = integrity::sha256_file(path)?;
        let dest = unique_scratch_dir(scratch, label)?;
        archive::extract_tar_gz(path, &dest)?;
        let dir = archive::effective_root(&dest)?;
        return Ok(FetchedSource { dir, integrity });
    }

    anyhow::bail!(
        "source '{}' is neither a directory nor a package archive",
        path.display()
    );
}

fn fetch_http(url: &str, scratch: &Path, label: &str) -> Result<FetchedSource> {
    logger::debug(&format!("Downloading {}", url));
    fs::create_dir_all(scratch).with_context(|| format!("create {}", scratch.display()))?;

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("request {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("download failed for {url}: HTTP {}", response.status());
    }
    let bytes = response.bytes().with_context(|| format!("read {url}"))?;

    let integrity = integrity::sha256_bytes(&bytes);
    let archive_path = scratch.join(format!("{label}.tar.gz"));
    fs::write(&archive_path, &bytes)
        .with_context(|| format!("write {}", archive_path.display()))?;

    let dest = unique_scratch_dir(scratch, label)?;
    archive::extract_tar_gz(&archive_path, &dest)?;
    let dir = archive::effective_root(&dest)?;
    Ok(FetchedSource { dir, integrity })
}

fn fetch_git(
    url: &str,
    reference: Option<&str>,
    scratch: &Path,
    label: &str,
) -> Result<FetchedSource> {
    let dest = unique_scratch_dir(scratch, &format!("{label}-git"))?;

    let mut clone = Command::new("git");
    clone.arg("clone");
    if reference.is_none() {
        clone.args(["--depth", "1"]);
    }
    clone.arg(url).arg(&dest);

    logger::debug(&format!("Running: git clone {} {}", url, dest.display()));
    let output = clone.output().context("run git clone")?;
    logger::capture_output(&format!("git clone {url}"), &output);
    if !output.status.success() {
        anyhow::bail!(
            "git clone failed for {url}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    if let Some(reference) = reference {
        let output = Command::new("git")
            .arg("-C")
            .arg(&dest)
            .args(["checkout", reference])
            .output()
            .context("run git checkout")?;
        logger::capture_output(&format!("git checkout {reference}"), &output);
        if !output.status.success() {
            anyhow::bail!(
                "git checkout of '{reference}' failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
    }

    // History is not part of the package
    let _ = fs::remove_dir_all(dest.join(".git"));

    let integrity = integrity::sha256_dir(&dest)?;
    Ok(FetchedSource {
        dir: dest,
        integrity,
    })
}

fn fetch_object_storage(url: &str, scratch: &Path, label: &str) -> Result<FetchedSource> {
    fs::create_dir_all(scratch).with_context(|| format!("create {}", scratch.display()))?;
    let file_name = url.rsplit('/').next().unwrap_or(label);
    let download_path = scratch.join(file_name);

    let output = if url.starts_with("s3://") {
        let aws = which::which("aws").context("object-storage fetch needs the aws CLI on PATH")?;
        Command::new(aws)
            .args(["s3", "cp", url])
            .arg(&download_path)
            .output()
            .context("run aws s3 cp")?
    } else {
        let az = which::which("az").context("object-storage fetch needs the az CLI on PATH")?;
        Command::new(az)
            .args(["storage", "copy", "--source", url, "--destination"])
            .arg(&download_path)
            .output()
            .context("run az storage copy")?
    };

    logger::capture_output(&format!("object-storage fetch {url}"), &output);
    if !output.status.success() {
        anyhow::bail!(
            "object-storage fetch failed for {url}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    if !archive::is_archive(&download_path) {
        anyhow::bail!("object-storage locator '{url}' does not name a package archive");
    }

    let integrity = integrity::sha256_file(&download_path)?;
    let dest = unique_scratch_dir(scratch, label)?;
    archive::extract_tar_gz(&download_path, &dest)?;
    let dir = archive::effective_root(&dest)?;
    Ok(FetchedSource { dir, integrity })
}

/// Create a fresh scratch subdirectory, suffixing on collision
fn unique_scratch_dir(scratch: &Path, label: &str) -> Result<PathBuf> {
    fs::create_dir_all(scratch).with_context(|| format!("create {}", scratch.display()))?;

    let mut candidate = scratch.join(label);
    let mut counter = 1;
    while candidate.exists() {
        candidate = scratch.join(format!("{label}-{counter}"));
        counter += 1;
    }
    fs::create_dir_all(&candidate).with_context(|| format!("create {}", candidate.display()))?;
    Ok(candidate)
}
