//! Per-package error taxonomy.
//!
//! Every variant is caught at the package boundary by the aggregator, logged,
//! and the run moves on. Run-level setup failures use `anyhow` instead.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single HTTP request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("metadata unavailable from {url}: {reason}")]
    MetadataUnavailable { url: String, reason: String },

    #[error("malformed metadata from {url}: {reason}")]
    MetadataParseError { url: String, reason: String },

    #[error("no license field and no License classifier for {package}")]
    ClassifierAbsent { package: String },

    #[error("unsupported archive format: {file}")]
    UnsupportedArchiveFormat { file: String },

    #[error("no file matching '{file_name}' under {folder:?}")]
    LicenseFileNotFound { folder: PathBuf, file_name: String },

    #[error("scratch path already exists: {path:?}")]
    FilesystemConflict { path: PathBuf },

    #[error("license text unavailable for {package}: {reason}")]
    TextUnavailable { package: String, reason: String },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ResolveError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ResolveError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn text_unavailable(package: impl Into<String>, reason: impl ToString) -> Self {
        ResolveError::TextUnavailable {
            package: package.into(),
            reason: reason.to_string(),
        }
    }
}
