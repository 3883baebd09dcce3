//! License text acquisition.
//!
//! A resolved package takes one of two paths:
//! - [`direct`] when its project URL lives on the hosting platform, or an
//!   explicit text URL override exists;
//! - [`archive`] otherwise: download the distributed artifact and read the
//!   license file out of it.

pub mod archive;
pub mod direct;

use std::path::Path;

use tracing::debug;
use url::Url;

use crate::config::{Config, Overrides};
use crate::error::ResolveError;
use crate::models::{LicenseRecord, LicenseText};
use crate::registry::pypi::PackageMetadata;
use crate::registry::{Credentials, HttpSource};

/// Candidate project URL for a package: the text URL override, else a
/// keyword-matched canonical repository, else the registry's `home_page`.
pub fn project_url(name: &str, home_page: Option<&str>, overrides: &Overrides) -> Option<String> {
    if let Some(url) = overrides.text_url(name) {
        return Some(url.to_string());
    }
    if let Some(url) = overrides.keyword_repository(name) {
        return Some(url.to_string());
    }
    home_page
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

/// Whether `url` points at the hosting platform (`host` or `www.host`).
pub fn is_hosted(url: &str, host: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|h| h == host || h.strip_prefix("www.") == Some(host))
}

pub struct TextAcquirer<'a> {
    http: &'a dyn HttpSource,
    config: &'a Config,
    credentials: Option<&'a Credentials>,
    scratch: &'a Path,
}

impl<'a> TextAcquirer<'a> {
    pub fn new(
        http: &'a dyn HttpSource,
        config: &'a Config,
        credentials: Option<&'a Credentials>,
        scratch: &'a Path,
    ) -> Self {
        Self {
            http,
            config,
            credentials,
            scratch,
        }
    }

    /// Fetch the license text for `record`. Any scratch files created on the
    /// archive path are gone by the time this returns.
    pub async fn acquire(
        &self,
        record: &LicenseRecord,
        metadata: Option<&PackageMetadata>,
    ) -> Result<LicenseText, ResolveError> {
        let identity = &record.identity;
        let has_text_override = self.config.overrides.text_url(&identity.name).is_some();
        let hosted = record
            .text_location_url
            .as_deref()
            .filter(|url| has_text_override || is_hosted(url, &self.config.registry.hosting_host));

        if let Some(url) = hosted {
            debug!("{}: direct path via {}", identity, url);
            return direct::fetch(
                self.http,
                &self.config.registry,
                self.credentials,
                identity,
                url,
            )
            .await;
        }

        let metadata = metadata.ok_or_else(|| {
            ResolveError::text_unavailable(identity.to_string(), "no registry metadata to locate a release")
        })?;

        debug!("{}: archive path", identity);
        archive::fetch(
            self.http,
            &self.config.overrides,
            self.scratch,
            identity,
            metadata,
        )
        .await
    }
}
