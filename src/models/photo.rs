//! A photo as presented to clients.
//!
//! Photos are never stored as rows of their own. Every read assembles one from
//! the media host's resource plus the metadata attached to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used when a photo carries no uploader name.
pub const UNKNOWN_UPLOADER: &str = "Unknown";

/// A stored image together with its decoded metadata.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    /// Identifier assigned by the media host. Same value as `public_id`.
    pub id: String,

    /// Public identifier used to address the resource on the media host.
    pub public_id: String,

    /// Best-effort display name.
    pub filename: String,

    /// Direct content URL.
    pub image_url: String,

    /// Same as `image_url`; no separate thumbnail is generated.
    pub thumbnail_url: String,

    pub caption: String,

    pub uploader_name: String,

    pub uploader_email: String,

    pub uploader_avatar: String,

    /// Owner id captured at upload time. Sole key for edit/delete authorization.
    pub uploader_id: String,

    /// Size in bytes as reported by the media host.
    pub file_size: u64,

    /// Upload time assigned by the media host.
    pub created_at: DateTime<Utc>,
}
