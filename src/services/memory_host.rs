//! In-memory [`MediaHost`] used by tests.
//!
//! Mirrors the parts of the remote host the gateway relies on: folder search
//! sorted newest first and capped, metadata stored as parsed pairs under
//! `custom`, 404 errors for unknown ids. Every call is counted so tests can
//! assert that nothing reached the host.

use crate::services::{
    media_host::{HostError, HostResult, MediaHost, Resource, SearchQuery, UploadRequest},
    metadata_codec,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

#[derive(Default)]
pub struct MemoryHost {
    resources: Mutex<Vec<Resource>>,
    calls: AtomicUsize,
    uploads: AtomicUsize,
    fail_next: Mutex<Option<Option<String>>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a resource directly, bypassing the call counter.
    pub fn seed(&self, public_id: &str, created_at: DateTime<Utc>, context: Value) {
        self.resources.lock().unwrap().push(Resource {
            public_id: public_id.to_string(),
            original_filename: None,
            secure_url: format!("https://media.test/{public_id}.jpg"),
            bytes: 1024,
            created_at,
            context: Some(context),
        });
    }

    /// Make the next call fail with a 500 carrying `message`.
    pub fn fail_next(&self, message: Option<&str>) {
        *self.fail_next.lock().unwrap() = Some(message.map(str::to_string));
    }

    /// Number of calls that reached the host.
    pub fn remote_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin_call(&self) -> HostResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail_next.lock().unwrap().take() {
            Some(message) => Err(HostError::Api {
                status: 500,
                message,
            }),
            None => Ok(()),
        }
    }

    fn not_found(public_id: &str) -> HostError {
        HostError::Api {
            status: 404,
            message: Some(format!("Resource not found - {public_id}")),
        }
    }
}

#[async_trait]
impl MediaHost for MemoryHost {
    async fn search(&self, query: &SearchQuery) -> HostResult<Vec<Resource>> {
        self.begin_call()?;
        let prefix = format!("{}/", query.folder);
        let mut found: Vec<Resource> = self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.public_id.starts_with(&prefix))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(query.max_results);
        Ok(found)
    }

    async fn upload(&self, request: UploadRequest) -> HostResult<Resource> {
        self.begin_call()?;
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        let public_id = format!("{}/img{n:04}", request.folder);
        let original_filename = request.filename.as_deref().map(|name| {
            name.rsplit_once('.')
                .map(|(stem, _)| stem)
                .unwrap_or(name)
                .to_string()
        });

        let resource = Resource {
            secure_url: format!("https://media.test/{public_id}.jpg"),
            public_id,
            original_filename,
            bytes: request.bytes.len() as u64,
            // Distinct, increasing timestamps keep ordering deterministic.
            created_at: Utc::now() + Duration::milliseconds(n as i64),
            context: Some(json!({ "custom": metadata_codec::parse_pairs(&request.context) })),
        };
        self.resources.lock().unwrap().push(resource.clone());
        Ok(resource)
    }

    async fn resource(&self, public_id: &str) -> HostResult<Resource> {
        self.begin_call()?;
        self.resources
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.public_id == public_id)
            .cloned()
            .ok_or_else(|| Self::not_found(public_id))
    }

    async fn destroy(&self, public_id: &str) -> HostResult<()> {
        self.begin_call()?;
        self.resources
            .lock()
            .unwrap()
            .retain(|r| r.public_id != public_id);
        Ok(())
    }

    async fn update_context(&self, public_id: &str, context: &str) -> HostResult<()> {
        self.begin_call()?;
        let mut resources = self.resources.lock().unwrap();
        let resource = resources
            .iter_mut()
            .find(|r| r.public_id == public_id)
            .ok_or_else(|| Self::not_found(public_id))?;
        resource.context = Some(json!({ "custom": metadata_codec::parse_pairs(context) }));
        Ok(())
    }
}
