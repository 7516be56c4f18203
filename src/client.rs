//! Client for the `/api/photos` endpoints.
//!
//! Mirrors what the browser does: form-encoded uploads, JSON bodies for
//! delete and edit, and lenient rehydration of the returned photos.

use crate::models::{
    metadata::Uploader,
    photo::{Photo, UNKNOWN_UPLOADER},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, multipart};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Largest raw image accepted before compression.
pub const MAX_RAW_IMAGE_BYTES: u64 = 30 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("{0}")]
    InvalidImage(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Check a picked file before compressing and uploading it.
pub fn validate_image_file(content_type: &str, size: u64) -> ClientResult<()> {
    if !content_type.starts_with("image/") {
        return Err(ClientError::InvalidImage(
            "File must be an image (JPG, PNG, WebP).".into(),
        ));
    }
    if size > MAX_RAW_IMAGE_BYTES {
        return Err(ClientError::InvalidImage(format!(
            "File too large. Maximum 30MB, this file: {:.1}MB",
            size as f64 / 1024.0 / 1024.0
        )));
    }
    Ok(())
}

/// An image picked for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: String,
}

#[derive(Clone, Debug)]
pub struct PhotoClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PhotosEnvelope {
    #[serde(default)]
    photos: Vec<Value>,
}

#[derive(Deserialize)]
struct PhotoEnvelope {
    photo: PhotoPayload,
}

/// Photo as received on the wire; anything may be missing or null.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct PhotoPayload {
    id: Option<String>,
    public_id: Option<String>,
    filename: Option<String>,
    image_url: Option<String>,
    thumbnail_url: Option<String>,
    caption: Option<String>,
    uploader_name: Option<String>,
    uploader_email: Option<String>,
    uploader_avatar: Option<String>,
    uploader_id: Option<String>,
    file_size: Option<u64>,
    created_at: Option<String>,
}

impl PhotoPayload {
    /// Read one entry of a listing. Entries that are not objects, or whose
    /// fields have the wrong JSON type, are skipped.
    fn from_entry(entry: Value) -> Option<Self> {
        serde_json::from_value(entry).ok()
    }

    fn into_photo(self) -> Photo {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        let id = self.id.unwrap_or_default();
        let image_url = self.image_url.unwrap_or_default();
        Photo {
            public_id: non_empty(self.public_id).unwrap_or_else(|| id.clone()),
            thumbnail_url: non_empty(self.thumbnail_url).unwrap_or_else(|| image_url.clone()),
            id,
            filename: self.filename.unwrap_or_default(),
            image_url,
            caption: self.caption.unwrap_or_default(),
            uploader_name: non_empty(self.uploader_name)
                .unwrap_or_else(|| UNKNOWN_UPLOADER.to_string()),
            uploader_email: self.uploader_email.unwrap_or_default(),
            uploader_avatar: self.uploader_avatar.unwrap_or_default(),
            uploader_id: self.uploader_id.unwrap_or_default(),
            file_size: self.file_size.unwrap_or(0),
            created_at: self
                .created_at
                .as_deref()
                .and_then(parse_created_at)
                .unwrap_or_default(),
        }
    }
}

/// Unparseable or missing dates fall back to the Unix epoch.
fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

impl PhotoClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn photos_url(&self) -> String {
        format!("{}/api/photos", self.base_url)
    }

    pub async fn list(&self) -> ClientResult<Vec<Photo>> {
        let response = self.client.get(self.photos_url()).send().await?;
        let response = check(response, "Failed to fetch photos").await?;
        let envelope: PhotosEnvelope = response.json().await?;
        Ok(envelope
            .photos
            .into_iter()
            .filter_map(PhotoPayload::from_entry)
            .map(PhotoPayload::into_photo)
            .collect())
    }

    pub async fn upload(
        &self,
        file: UploadFile,
        caption: &str,
        uploader: &Uploader,
    ) -> ClientResult<Photo> {
        let part = multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.filename)
            .mime_str(&file.content_type)?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("caption", caption.to_string())
            .text("uploaderId", uploader.id.clone())
            .text("uploaderName", uploader.name.clone())
            .text("uploaderEmail", uploader.email.clone())
            .text("uploaderAvatar", uploader.avatar.clone());

        let response = self
            .client
            .post(self.photos_url())
            .multipart(form)
            .send()
            .await?;
        let response = check(response, "Failed to upload photo").await?;
        let envelope: PhotoEnvelope = response.json().await?;
        Ok(envelope.photo.into_photo())
    }

    /// Delete a photo on behalf of `uploader_id`; the server refuses unless
    /// that is the photo's recorded uploader.
    pub async fn delete(&self, photo: &Photo, uploader_id: &str) -> ClientResult<()> {
        let response = self
            .client
            .delete(self.photos_url())
            .json(&json!({
                "publicId": photo.public_id,
                "uploaderId": uploader_id,
            }))
            .send()
            .await?;
        check(response, "Failed to delete photo").await?;
        Ok(())
    }

    pub async fn update_caption(
        &self,
        photo: &Photo,
        uploader_id: &str,
        caption: &str,
    ) -> ClientResult<Photo> {
        let response = self
            .client
            .patch(self.photos_url())
            .json(&json!({
                "publicId": photo.public_id,
                "uploaderId": uploader_id,
                "caption": caption,
            }))
            .send()
            .await?;
        let response = check(response, "Failed to edit photo").await?;
        let envelope: PhotoEnvelope = response.json().await?;
        Ok(envelope.photo.into_photo())
    }
}

/// Pass successful responses through; otherwise read `{"error": ..}` from the
/// body, or use `fallback` when the body has no usable message.
async fn check(response: Response, fallback: &str) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<Value>()
        .await
        .ok()
        .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| fallback.to_string());

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
