//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks storage configuration and the allow-list

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe. Always returns 200 OK with a plain JSON body
/// and never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Verifies the media host credentials are configured.
/// 2. Reports whether any email is allow-listed.
///
/// Returns JSON describing each check. HTTP 200 when storage is configured,
/// HTTP 503 otherwise. An empty allow-list is reported but does not fail
/// readiness; it only means nobody can keep a session.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let missing = state.gateway.missing_settings();
    let storage_check = if missing.is_empty() {
        CheckStatus {
            ok: true,
            error: None,
        }
    } else {
        CheckStatus {
            ok: false,
            error: Some(format!("missing settings: {}", missing.join(", "))),
        }
    };

    let allow_list_check = if state.allow_list.is_empty() {
        CheckStatus {
            ok: false,
            error: Some("no allowed emails configured".into()),
        }
    } else {
        CheckStatus {
            ok: true,
            error: None,
        }
    };

    let overall_ok = storage_check.ok;

    let mut checks = HashMap::new();
    checks.insert("storage", storage_check);
    checks.insert("allow_list", allow_list_check);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
