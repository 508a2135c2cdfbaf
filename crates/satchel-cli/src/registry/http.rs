//! HTTP registry
//!
//! Same index shape as the filesystem registry, served over http(s):
//! `GET <base>/<plugin>/index.toml`, artifacts fetched relative to the
//! plugin's URL unless the index names a fully-qualified URL.

use anyhow::{Context, Result};

use crate::install::resolver::ResolvedPackage;

use super::{best_match, parse_index, RegistryClient, INDEX_FILE_NAME};

pub struct HttpRegistry {
    base: String,
    client: reqwest::blocking::Client,
}

impl HttpRegistry {
    pub fn new(base: String) -> Self {
        HttpRegistry {
            base: base.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn plugin_url(&self, name: &str) -> String {
        format!("{}/{}", self.base, name)
    }
}

impl RegistryClient for HttpRegistry {
    fn resolve_package(
        &self,
        name: &str,
        version_spec: Option<&str>,
    ) -> Result<Option<ResolvedPackage>> {
        let index_url = format!("{}/{}", self.plugin_url(name), INDEX_FILE_NAME);
        let response = self
            .client
            .get(&index_url)
            .send()
            .with_context(|| format!("request {index_url}"))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(name, registry = %self.base, "no registry index");
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("registry request failed: HTTP {} for {index_url}", response.status());
        }

        let content = response
            .text()
            .with_context(|| format!("read {index_url}"))?;
        let index = parse_index(&content).with_context(|| format!("parse {index_url}"))?;

        let Some(entry) = best_match(&index.versions, version_spec) else {
            return Ok(None);
        };

        let artifact_url = if entry.artifact.starts_with("http://")
            || entry.artifact.starts_with("https://")
        {
            entry.artifact.clone()
        } else {
            format!("{}/{}", self.plugin_url(name), entry.artifact)
        };

        Ok(Some(ResolvedPackage {
            name: name.to_string(),
            version: entry.version.clone(),
            locator: artifact_url,
            integrity: None,
            local_path: None,
        }))
    }
}
