//! Defines routes for the photo journal API.
//!
//! ## Structure
//! - **Photos** (all on one path, method decides the operation)
//!   - `GET    /api/photos`: list newest photos
//!   - `POST   /api/photos`: multipart upload
//!   - `DELETE /api/photos`: owner-only delete
//!   - `PATCH  /api/photos`: owner-only caption edit
//!
//! - **Identity**
//!   - `GET    /api/auth/config`: identity provider client settings
//!   - `POST   /api/auth/allowed`: allow-list query
//!
//! - **Health**: `/healthz`, `/readyz`

use crate::{
    handlers::{
        auth_handlers::{auth_config, email_allowed},
        health_handlers::{healthz, readyz},
        photo_handlers::{delete_photo, list_photos, update_photo, upload_photo},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. The router carries shared state (`AppState`) to all
/// handlers; request bodies are capped at `max_upload_bytes`.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // identity
        .route("/api/auth/config", get(auth_config))
        .route("/api/auth/allowed", post(email_allowed))
        // photos
        .route(
            "/api/photos",
            get(list_photos)
                .post(upload_photo)
                .delete(delete_photo)
                .patch(update_photo),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
