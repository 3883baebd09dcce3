//! HTTP access to the package registry and the source-hosting platform.
//!
//! All network traffic goes through the [`HttpSource`] trait so the resolver
//! and text acquisition stages can be exercised against canned responses.

pub mod github;
pub mod pypi;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;

/// Hosting platform credential, given on the command line as `user:token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl std::str::FromStr for Credentials {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((user, token)) if !user.is_empty() && !token.is_empty() => Ok(Credentials {
                username: user.to_string(),
                token: token.to_string(),
            }),
            _ => Err("expected credentials formatted as \"user:token\"".to_string()),
        }
    }
}

#[async_trait]
pub trait HttpSource: Send + Sync {
    /// GET `url` and return the body as text. Non-2xx responses are errors.
    async fn get_text(&self, url: &str, credentials: Option<&Credentials>)
        -> Result<String, FetchError>;

    /// GET `url` and return the raw body.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// [`HttpSource`] backed by a shared `reqwest` client.
///
/// No timeout is set beyond the transport default and nothing is retried.
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<reqwest::Response, FetchError> {
        let mut request = self.client.get(url);
        if let Some(creds) = credentials {
            request = request.basic_auth(&creds.username, Some(&creds.token));
        }

        let response = request.send().await.map_err(|e| transport(url, e))?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

fn transport(url: &str, e: reqwest::Error) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl HttpSource for HttpClient {
    async fn get_text(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<String, FetchError> {
        let response = self.send(url, credentials).await?;
        response.text().await.map_err(|e| transport(url, e))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.send(url, None).await?;
        let bytes = response.bytes().await.map_err(|e| transport(url, e))?;
        Ok(bytes.to_vec())
    }
}
