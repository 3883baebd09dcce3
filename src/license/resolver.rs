use tracing::{debug, info};

use super::classifier::{classify, sanitize_label};
use crate::config::Config;
use crate::error::ResolveError;
use crate::models::{ClassificationSource, LicenseClassification, LicenseRecord, PackageIdentity};
use crate::registry::pypi::{fetch_metadata, metadata_url, PackageMetadata};
use crate::registry::HttpSource;
use crate::text::project_url;

/// Outcome of the metadata stage for one package.
#[derive(Debug)]
pub struct Resolution {
    pub record: LicenseRecord,
    /// `None` when the record came from the fallback table.
    pub metadata: Option<PackageMetadata>,
}

/// Resolves a package identity to a license classification via the registry.
pub struct Resolver<'a> {
    http: &'a dyn HttpSource,
    config: &'a Config,
}

impl<'a> Resolver<'a> {
    pub fn new(http: &'a dyn HttpSource, config: &'a Config) -> Self {
        Self { http, config }
    }

    /// The metadata URL queried for `identity`: a fixed override URL when the
    /// package has one, the canonical registry URL otherwise.
    pub fn query_url(&self, identity: &PackageIdentity) -> String {
        match self.config.overrides.query_url(&identity.name) {
            Some(url) => url.to_string(),
            None => metadata_url(&self.config.registry.base_url, identity),
        }
    }

    pub async fn resolve(&self, identity: &PackageIdentity) -> Result<Resolution, ResolveError> {
        match self.resolve_from_registry(identity).await {
            Ok(resolution) => Ok(resolution),
            Err(err) => match self.config.overrides.fallback(&identity.name) {
                Some(fallback) => {
                    info!(
                        "{}: metadata lookup failed ({}), using fallback license {}",
                        identity, err, fallback.license
                    );
                    Ok(Resolution {
                        record: LicenseRecord {
                            identity: identity.clone(),
                            classification: LicenseClassification {
                                raw_field: None,
                                normalized_label: sanitize_label(&fallback.license),
                                source: ClassificationSource::Override,
                            },
                            registry_url: fallback.url.clone(),
                            text_location_url: project_url(
                                &identity.name,
                                None,
                                &self.config.overrides,
                            ),
                        },
                        metadata: None,
                    })
                }
                None => Err(err),
            },
        }
    }

    async fn resolve_from_registry(
        &self,
        identity: &PackageIdentity,
    ) -> Result<Resolution, ResolveError> {
        let url = self.query_url(identity);
        let metadata = fetch_metadata(self.http, &url).await?;
        let classification = classify(identity, &metadata.info, &self.config.overrides)?;

        debug!(
            "{}: {} (from {})",
            identity, classification.normalized_label, classification.source
        );

        let text_location_url = project_url(
            &identity.name,
            metadata.info.home_page.as_deref(),
            &self.config.overrides,
        );

        Ok(Resolution {
            record: LicenseRecord {
                identity: identity.clone(),
                classification,
                registry_url: url,
                text_location_url,
            },
            metadata: Some(metadata),
        })
    }
}
