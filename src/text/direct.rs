use tracing::debug;

use super::is_hosted;
use crate::config::RegistrySettings;
use crate::error::ResolveError;
use crate::models::{LicenseText, PackageIdentity, TextPath};
use crate::registry::github::{fetch_license_text, repository_from_url};
use crate::registry::{Credentials, HttpSource};

/// Fetch a license text without downloading the package.
///
/// Hosted repositories go through the hosting platform's license API. Any
/// other URL (an explicit text override) is fetched as-is.
pub async fn fetch(
    http: &dyn HttpSource,
    settings: &RegistrySettings,
    credentials: Option<&Credentials>,
    identity: &PackageIdentity,
    url: &str,
) -> Result<LicenseText, ResolveError> {
    if !is_hosted(url, &settings.hosting_host) {
        debug!("{}: fetching license text override {}", identity, url);
        let text = http
            .get_text(url, None)
            .await
            .map_err(|e| ResolveError::text_unavailable(identity.to_string(), e))?;
        return Ok(LicenseText {
            source_url: url.to_string(),
            text,
            path: TextPath::Direct,
        });
    }

    let repo = repository_from_url(url).ok_or_else(|| {
        ResolveError::text_unavailable(
            identity.to_string(),
            format!("no repository in project URL {}", url),
        )
    })?;

    let (source_url, text) = fetch_license_text(http, &settings.hosting_api, &repo, credentials)
        .await
        .map_err(|e| ResolveError::text_unavailable(identity.to_string(), e))?;

    Ok(LicenseText {
        source_url,
        text,
        path: TextPath::Direct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::fake::FakeHttp;

    #[tokio::test]
    async fn test_plain_override_url_is_fetched_raw() {
        let http = FakeHttp::new().with_text("https://example.org/LICENSE.txt", "BSD text");
        let id = PackageIdentity::new("pkg", "1.0");

        let text = fetch(
            &http,
            &RegistrySettings::default(),
            None,
            &id,
            "https://example.org/LICENSE.txt",
        )
        .await
        .unwrap();
        assert_eq!(text.source_url, "https://example.org/LICENSE.txt");
        assert_eq!(text.text, "BSD text");
    }

    #[tokio::test]
    async fn test_license_api_failure_is_text_unavailable() {
        let http = FakeHttp::new().with_status("https://api.github.com/repos/psf/requests/license", 403);
        let id = PackageIdentity::new("requests", "2.25.1");

        let err = fetch(
            &http,
            &RegistrySettings::default(),
            None,
            &id,
            "https://github.com/psf/requests",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ResolveError::TextUnavailable { .. }));
    }
}
