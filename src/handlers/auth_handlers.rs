//! Identity endpoints used by the browser before it talks to the provider.

use crate::{services::identity_gate::IdentityProviderConfig, state::AppState};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct AllowedReq {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllowedResponse {
    pub allowed: bool,
}

/// `GET /api/auth/config`: public settings of the identity provider's client app.
pub async fn auth_config(State(state): State<AppState>) -> Json<IdentityProviderConfig> {
    Json(state.identity.as_ref().clone())
}

/// `POST /api/auth/allowed`: whether an email is on the allow-list.
pub async fn email_allowed(
    State(state): State<AppState>,
    Json(req): Json<AllowedReq>,
) -> Json<AllowedResponse> {
    Json(AllowedResponse {
        allowed: state.allow_list.contains(&req.email),
    })
}
