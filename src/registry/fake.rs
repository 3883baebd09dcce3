use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Credentials, HttpSource};
use crate::error::FetchError;

enum Canned {
    Body(Vec<u8>),
    Status(u16),
    Broken,
}

/// In-memory [`HttpSource`] serving canned bodies by exact URL.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct FakeHttp {
    responses: HashMap<String, Canned>,
    requests: Mutex<Vec<String>>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, url: &str, body: &str) -> Self {
        self.responses
            .insert(url.to_string(), Canned::Body(body.as_bytes().to_vec()));
        self
    }

    pub fn with_json(self, url: &str, body: serde_json::Value) -> Self {
        self.with_text(url, &body.to_string())
    }

    pub fn with_bytes(mut self, url: &str, body: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), Canned::Body(body));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), Canned::Status(status));
        self
    }

    /// Simulate a connection failure for `url`.
    pub fn with_broken(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Canned::Broken);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        match self.responses.get(url) {
            Some(Canned::Body(body)) => Ok(body.clone()),
            Some(Canned::Status(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            Some(Canned::Broken) => Err(FetchError::Transport {
                url: url.to_string(),
                message: "connection reset".to_string(),
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

#[async_trait]
impl HttpSource for FakeHttp {
    async fn get_text(
        &self,
        url: &str,
        _credentials: Option<&Credentials>,
    ) -> Result<String, FetchError> {
        let body = self.respond(url)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.respond(url)
    }
}
