//! src/services/photo_gateway.rs
//!
//! PhotoGateway: list/create/delete/update-caption on top of a remote
//! [`MediaHost`]. There is no local store and no cache: every call is a
//! round trip to the host, and concurrent edits are last-writer-wins.
//!
//! Mutations are only allowed for the uploader recorded in the resource's
//! metadata. The check lives in [`authorize`] and is shared by delete and
//! update.

use crate::{
    config::StorageConfig,
    models::{
        metadata::{PhotoMetadata, Uploader},
        photo::{Photo, UNKNOWN_UPLOADER},
    },
    services::{
        cloudinary::CloudinaryHost,
        media_host::{HostError, MediaHost, Resource, SearchQuery, UploadRequest},
        metadata_codec,
    },
};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Maximum number of photos returned by a listing.
pub const LIST_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Missing Cloudinary env vars: {}", .missing.join(", "))]
    NotConfigured { missing: Vec<&'static str> },
    #[error("Missing image file")]
    MissingFile,
    #[error("Missing uploader info")]
    MissingUploader,
    #[error("Missing publicId or uploaderId")]
    MissingIds,
    #[error("Not allowed to {action} this photo")]
    Forbidden { action: &'static str },
    #[error("{message}")]
    Upstream { message: String },
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Outcome of the ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

/// Decide whether `acting_id` may mutate a resource carrying `stored`.
///
/// Only the recorded uploader may; a resource without a recorded owner can
/// be mutated by nobody.
pub fn authorize(stored: &PhotoMetadata, acting_id: &str) -> Access {
    if !stored.uploader_id.is_empty() && stored.uploader_id == acting_id {
        Access::Allow
    } else {
        Access::Deny
    }
}

/// An uploaded image file.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub bytes: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// Input of [`PhotoGateway::create`]. Fields are taken as submitted and
/// normalized by the gateway.
#[derive(Debug, Clone, Default)]
pub struct NewPhoto {
    pub file: Option<ImageFile>,
    pub caption: String,
    pub uploader: Uploader,
}

#[derive(Clone)]
enum Backend {
    Ready(Arc<dyn MediaHost>),
    Unconfigured(Vec<&'static str>),
}

/// Photo operations over the remote media host.
#[derive(Clone)]
pub struct PhotoGateway {
    backend: Backend,
    /// Root folder under which every photo is stored.
    folder: String,
}

impl PhotoGateway {
    /// Build a gateway from configuration. Without complete credentials the
    /// gateway still builds, but every operation fails with
    /// [`GatewayError::NotConfigured`].
    pub fn from_config(cfg: &StorageConfig) -> Self {
        match cfg.credentials() {
            Some(credentials) => Self::with_host(
                Arc::new(CloudinaryHost::new(credentials, &cfg.api_base)),
                cfg.folder.clone(),
            ),
            None => Self::unconfigured(cfg.missing(), cfg.folder.clone()),
        }
    }

    pub fn with_host(host: Arc<dyn MediaHost>, folder: impl Into<String>) -> Self {
        Self {
            backend: Backend::Ready(host),
            folder: folder.into(),
        }
    }

    pub fn unconfigured(missing: Vec<&'static str>, folder: impl Into<String>) -> Self {
        Self {
            backend: Backend::Unconfigured(missing),
            folder: folder.into(),
        }
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Fail with the configuration error when credentials are missing.
    pub fn ensure_configured(&self) -> GatewayResult<()> {
        self.host().map(|_| ())
    }

    /// Names of the missing storage settings, empty when configured.
    pub fn missing_settings(&self) -> &[&'static str] {
        match &self.backend {
            Backend::Ready(_) => &[],
            Backend::Unconfigured(missing) => missing.as_slice(),
        }
    }

    fn host(&self) -> GatewayResult<&Arc<dyn MediaHost>> {
        match &self.backend {
            Backend::Ready(host) => Ok(host),
            Backend::Unconfigured(missing) => Err(GatewayError::NotConfigured {
                missing: missing.clone(),
            }),
        }
    }

    /// List the newest photos under the root folder.
    pub async fn list(&self) -> GatewayResult<Vec<Photo>> {
        let host = self.host()?;
        let query = SearchQuery {
            folder: self.folder.clone(),
            max_results: LIST_LIMIT,
        };

        let mut resources = host
            .search(&query)
            .await
            .map_err(|err| upstream(err, "Failed to fetch photos"))?;

        resources.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        resources.truncate(LIST_LIMIT);

        Ok(resources.iter().map(map_resource).collect())
    }

    /// Store a new photo in the uploader's sub-folder.
    pub async fn create(&self, new_photo: NewPhoto) -> GatewayResult<Photo> {
        let host = self.host()?;
        let file = new_photo.file.ok_or(GatewayError::MissingFile)?;

        let uploader = normalize_uploader(new_photo.uploader);
        if uploader.id.is_empty() || uploader.email.is_empty() {
            return Err(GatewayError::MissingUploader);
        }

        let metadata = PhotoMetadata::new(new_photo.caption.trim(), &uploader);
        let request = UploadRequest {
            bytes: file.bytes,
            filename: file.filename,
            content_type: file.content_type,
            folder: format!("{}/{}", self.folder, uploader.id),
            context: metadata_codec::encode(&metadata),
        };

        let resource = host
            .upload(request)
            .await
            .map_err(|err| upstream(err, "Failed to upload photo"))?;

        info!(
            "stored photo {} for uploader {}",
            resource.public_id, uploader.id
        );
        Ok(to_photo(&resource, metadata))
    }

    /// Permanently delete a photo owned by `acting_id`.
    pub async fn delete(&self, public_id: &str, acting_id: &str) -> GatewayResult<()> {
        let host = self.host()?;
        if public_id.is_empty() || acting_id.is_empty() {
            return Err(GatewayError::MissingIds);
        }

        let resource = host
            .resource(public_id)
            .await
            .map_err(|err| upstream(err, "Failed to delete photo"))?;
        let stored = metadata_codec::decode(resource.context.as_ref());

        if authorize(&stored, acting_id) == Access::Deny {
            warn!("uploader {} denied delete of {}", acting_id, public_id);
            return Err(GatewayError::Forbidden { action: "delete" });
        }

        host.destroy(public_id)
            .await
            .map_err(|err| upstream(err, "Failed to delete photo"))?;

        info!("deleted photo {} for uploader {}", public_id, acting_id);
        Ok(())
    }

    /// Replace the caption of a photo owned by `acting_id`, keeping every
    /// other metadata field, and return the host's view afterwards.
    pub async fn update_caption(
        &self,
        public_id: &str,
        acting_id: &str,
        caption: &str,
    ) -> GatewayResult<Photo> {
        let host = self.host()?;
        if public_id.is_empty() || acting_id.is_empty() {
            return Err(GatewayError::MissingIds);
        }

        let resource = host
            .resource(public_id)
            .await
            .map_err(|err| upstream(err, "Failed to edit photo"))?;
        let stored = metadata_codec::decode(resource.context.as_ref());

        if authorize(&stored, acting_id) == Access::Deny {
            warn!("uploader {} denied edit of {}", acting_id, public_id);
            return Err(GatewayError::Forbidden { action: "edit" });
        }

        let merged = PhotoMetadata {
            caption: caption.trim().to_string(),
            ..stored
        };

        host.update_context(public_id, &metadata_codec::encode(&merged))
            .await
            .map_err(|err| upstream(err, "Failed to edit photo"))?;

        let latest = host
            .resource(public_id)
            .await
            .map_err(|err| upstream(err, "Failed to edit photo"))?;

        info!("updated caption of {} for uploader {}", public_id, acting_id);
        Ok(map_resource(&latest))
    }
}

fn normalize_uploader(uploader: Uploader) -> Uploader {
    let name = uploader.name.trim();
    Uploader {
        id: uploader.id.trim().to_string(),
        name: if name.is_empty() {
            UNKNOWN_UPLOADER.to_string()
        } else {
            name.to_string()
        },
        email: uploader.email.trim().to_string(),
        avatar: uploader.avatar.trim().to_string(),
    }
}

fn upstream(err: HostError, fallback: &str) -> GatewayError {
    error!("media host error: {}", err);
    GatewayError::Upstream {
        message: err
            .message()
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| fallback.to_string()),
    }
}

/// Assemble a photo from a resource and its stored metadata.
pub fn map_resource(resource: &Resource) -> Photo {
    to_photo(resource, metadata_codec::decode(resource.context.as_ref()))
}

fn to_photo(resource: &Resource, metadata: PhotoMetadata) -> Photo {
    let filename = resource
        .original_filename
        .clone()
        .filter(|name| !name.is_empty())
        .or_else(|| {
            resource
                .public_id
                .rsplit('/')
                .next()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "photo".to_string());

    Photo {
        id: resource.public_id.clone(),
        public_id: resource.public_id.clone(),
        filename,
        image_url: resource.secure_url.clone(),
        thumbnail_url: resource.secure_url.clone(),
        caption: metadata.caption,
        uploader_name: metadata.uploader_name,
        uploader_email: metadata.uploader_email,
        uploader_avatar: metadata.uploader_avatar,
        uploader_id: metadata.uploader_id,
        file_size: resource.bytes,
        created_at: resource.created_at,
    }
}
