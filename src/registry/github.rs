use serde::Deserialize;
use url::Url;

use super::{Credentials, HttpSource};

/// Owner and name of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

/// Response of `GET /repos/{owner}/{repo}/license`.
#[derive(Debug, Deserialize)]
struct LicenseContent {
    download_url: Option<String>,
}

/// Parse a repository out of a project URL.
///
/// `https://github.com/owner/repo/tree/main` gives `owner/repo`. A bare
/// `https://github.com/repo` is read as `repo/repo`.
pub fn repository_from_url(project_url: &str) -> Option<Repository> {
    let url = Url::parse(project_url).ok()?;
    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .collect();

    let (owner, name) = match segments.as_slice() {
        [owner, repo, ..] => (*owner, *repo),
        [repo] => (*repo, *repo),
        [] => return None,
    };

    let name = name.trim_end_matches(".git");
    if owner.is_empty() || name.is_empty() {
        return None;
    }

    Some(Repository {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

/// Query the hosting platform's license endpoint, then download the raw text.
///
/// Returns the raw-content URL together with the text.
pub async fn fetch_license_text(
    http: &dyn HttpSource,
    api_base: &str,
    repo: &Repository,
    credentials: Option<&Credentials>,
) -> anyhow::Result<(String, String)> {
    let api_url = format!(
        "{}/repos/{}/{}/license",
        api_base.trim_end_matches('/'),
        repo.owner,
        repo.name
    );

    let body = http.get_text(&api_url, credentials).await?;
    let content: LicenseContent = serde_json::from_str(&body)?;
    let download_url = content
        .download_url
        .ok_or_else(|| anyhow::anyhow!("no download_url in {}", api_url))?;

    let text = http.get_text(&download_url, None).await?;
    Ok((download_url, text))
}
