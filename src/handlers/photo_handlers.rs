//! HTTP handlers for `/api/photos`.
//!
//! Bodies are parsed here; validation, ownership and every media host call
//! are delegated to `PhotoGateway`.

use crate::{
    errors::AppError,
    models::photo::Photo,
    services::photo_gateway::{ImageFile, NewPhoto},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct PhotoListResponse {
    pub photos: Vec<Photo>,
}

#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    pub photo: Photo,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Body of `DELETE /api/photos`. Missing fields are reported by the gateway.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeletePhotoReq {
    pub public_id: String,
    pub uploader_id: String,
}

/// Body of `PATCH /api/photos`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePhotoReq {
    pub public_id: String,
    pub uploader_id: String,
    pub caption: String,
}

/// `GET /api/photos`: newest photos first.
pub async fn list_photos(
    State(state): State<AppState>,
) -> Result<Json<PhotoListResponse>, AppError> {
    let photos = state.gateway.list().await?;
    Ok(Json(PhotoListResponse { photos }))
}

/// `POST /api/photos`: multipart upload with `file`, `caption` and the
/// uploader fields.
pub async fn upload_photo(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PhotoResponse>, AppError> {
    state.gateway.ensure_configured()?;

    let mut new_photo = NewPhoto::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            // Only an actual file part counts; a plain text `file` field is ignored.
            "file" if field.file_name().is_some() => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                new_photo.file = Some(ImageFile {
                    bytes,
                    filename,
                    content_type,
                });
            }
            "caption" => new_photo.caption = field.text().await?,
            "uploaderId" => new_photo.uploader.id = field.text().await?,
            "uploaderName" => new_photo.uploader.name = field.text().await?,
            "uploaderEmail" => new_photo.uploader.email = field.text().await?,
            "uploaderAvatar" => new_photo.uploader.avatar = field.text().await?,
            _ => {}
        }
    }

    let photo = state.gateway.create(new_photo).await?;
    Ok(Json(PhotoResponse { photo }))
}

/// `DELETE /api/photos`: owner-only, irreversible.
pub async fn delete_photo(
    State(state): State<AppState>,
    payload: Result<Json<DeletePhotoReq>, JsonRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    state.gateway.ensure_configured()?;
    let Json(req) = payload?;

    state
        .gateway
        .delete(req.public_id.trim(), req.uploader_id.trim())
        .await?;
    Ok(Json(DeleteResponse { success: true }))
}

/// `PATCH /api/photos`: owner-only caption edit.
pub async fn update_photo(
    State(state): State<AppState>,
    payload: Result<Json<UpdatePhotoReq>, JsonRejection>,
) -> Result<Json<PhotoResponse>, AppError> {
    state.gateway.ensure_configured()?;
    let Json(req) = payload?;

    let photo = state
        .gateway
        .update_caption(req.public_id.trim(), req.uploader_id.trim(), &req.caption)
        .await?;
    Ok(Json(PhotoResponse { photo }))
}
