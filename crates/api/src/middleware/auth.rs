//! Admin authentication middleware.
//!
//! Admin routes require an `X-API-Key` header whose SHA-256 digest matches
//! `security.admin_api_key_hash`.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::app::AppState;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Marker stored in request extensions once the admin key was accepted.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

/// Middleware for admin-only routes.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.admin_enabled() {
        return forbidden_response("Admin API is disabled");
    }

    let api_key = match req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        Some(key) if !key.is_empty() => key,
        _ => return unauthorized_response("Invalid or missing API key"),
    };

    if !shared::crypto::verify_key_hash(api_key, &state.config.security.admin_api_key_hash) {
        tracing::warn!(path = %req.uri().path(), "Rejected admin request with invalid API key");
        return unauthorized_response("Invalid or missing API key");
    }

    req.extensions_mut().insert(AdminAuth);
    next.run(req).await
}

/// Helper to create unauthorized response.
fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

/// Helper to create forbidden response.
fn forbidden_response(message: &str) -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "forbidden",
            "message": message
        })),
    )
        .into_response()
}
