//! Abstraction over the remote media host that stores image payloads and
//! their metadata.
//!
//! The gateway only talks to this trait. `CloudinaryHost` is the production
//! implementation; tests use an in-memory one.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// A stored image as reported by the media host.
#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    pub public_id: String,

    #[serde(default)]
    pub original_filename: Option<String>,

    #[serde(default)]
    pub secure_url: String,

    #[serde(default)]
    pub bytes: u64,

    pub created_at: DateTime<Utc>,

    /// Raw metadata, either `{"custom": {..}}` or a flat object.
    #[serde(default)]
    pub context: Option<Value>,
}

/// Parameters of a folder listing.
///
/// Results are always sorted by creation time, newest first, and include
/// metadata.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub folder: String,
    pub max_results: usize,
}

impl SearchQuery {
    /// Host search expression matching everything under the folder.
    pub fn expression(&self) -> String {
        format!("public_id:{}/*", self.folder)
    }
}

/// An image payload to store.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Destination folder, e.g. `root/uploader-id`.
    pub folder: String,
    /// Encoded metadata string.
    pub context: String,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("media host responded with status {status}")]
    Api {
        status: u16,
        /// Message extracted from the host's error body, when present.
        message: Option<String>,
    },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("unexpected media host response: {0}")]
    Decode(String),
}

impl HostError {
    /// Human-readable message carried by the error, if the host supplied one.
    pub fn message(&self) -> Option<String> {
        match self {
            HostError::Api { message, .. } => message.clone(),
            HostError::Transport(err) => Some(err.to_string()),
            HostError::Decode(detail) => Some(detail.clone()),
        }
    }
}

pub type HostResult<T> = Result<T, HostError>;

#[async_trait]
pub trait MediaHost: Send + Sync {
    /// List resources under a folder, newest first.
    async fn search(&self, query: &SearchQuery) -> HostResult<Vec<Resource>>;

    /// Store an image with its metadata.
    async fn upload(&self, request: UploadRequest) -> HostResult<Resource>;

    /// Fetch a single resource including its metadata.
    async fn resource(&self, public_id: &str) -> HostResult<Resource>;

    /// Permanently remove a resource.
    async fn destroy(&self, public_id: &str) -> HostResult<()>;

    /// Replace the whole metadata block of a resource.
    async fn update_context(&self, public_id: &str, context: &str) -> HostResult<()>;
}
