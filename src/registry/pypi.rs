use std::collections::HashMap;

use serde::Deserialize;

use super::HttpSource;
use crate::error::{FetchError, ResolveError};
use crate::models::PackageIdentity;

/// The subset of the registry's JSON document the pipeline reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageMetadata {
    pub info: PackageInfo,
    #[serde(default)]
    pub releases: HashMap<String, Vec<ReleaseFile>>,
    /// Files of the requested version, on the version-specific endpoint.
    #[serde(default)]
    pub urls: Vec<ReleaseFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageInfo {
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub classifiers: Option<Vec<String>>,
    #[serde(default)]
    pub home_page: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseFile {
    pub url: String,
}

impl PackageMetadata {
    /// Distributed files for `version`: `releases[version]`, or the
    /// endpoint's own `urls` list when the releases map lacks it.
    pub fn release_files(&self, version: &str) -> &[ReleaseFile] {
        match self.releases.get(version) {
            Some(files) if !files.is_empty() => files,
            _ => &self.urls,
        }
    }
}

/// Canonical metadata URL: `{base}/{name}/{version}/json`.
pub fn metadata_url(base: &str, identity: &PackageIdentity) -> String {
    format!(
        "{}/{}/{}/json",
        base.trim_end_matches('/'),
        identity.name,
        identity.version
    )
}

/// Fetch and parse the metadata document at `url`.
pub async fn fetch_metadata(
    http: &dyn HttpSource,
    url: &str,
) -> Result<PackageMetadata, ResolveError> {
    let body = http.get_text(url, None).await.map_err(|e| match e {
        FetchError::Status { status, .. } => ResolveError::MetadataUnavailable {
            url: url.to_string(),
            reason: format!("HTTP {}", status),
        },
        FetchError::Transport { message, .. } => ResolveError::MetadataUnavailable {
            url: url.to_string(),
            reason: message,
        },
    })?;

    parse_metadata(url, &body)
}

fn parse_metadata(url: &str, body: &str) -> Result<PackageMetadata, ResolveError> {
    serde_json::from_str(body).map_err(|e| ResolveError::MetadataParseError {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
