//! Acting user extractor.
//!
//! The console front end identifies the signed-in user through headers set
//! by its session layer. Nothing here authenticates; it only attributes
//! audit entries and history rows.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use domain::models::AuditContext;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const USER_ROLE_HEADER: &str = "X-User-Role";
pub const SESSION_ID_HEADER: &str = "X-Session-Id";

const MAX_HEADER_VALUE_LENGTH: usize = 256;

/// Who made the request and from where.
#[derive(Debug, Clone, Default)]
pub struct Actor(pub AuditContext);

impl Actor {
    pub fn user_id(&self) -> Option<&str> {
        self.0.user_id.as_deref()
    }

    pub fn context(&self) -> &AuditContext {
        &self.0
    }

    fn from_headers(headers: &HeaderMap, peer: Option<SocketAddr>) -> Self {
        let ip_address = header_value(headers, "X-Forwarded-For")
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
            .filter(|v| !v.is_empty())
            .or_else(|| header_value(headers, "X-Real-IP"))
            .or_else(|| peer.map(|addr| addr.ip().to_string()));

        Actor(AuditContext {
            user_id: header_value(headers, USER_ID_HEADER),
            user_role: header_value(headers, USER_ROLE_HEADER),
            session_id: header_value(headers, SESSION_ID_HEADER),
            ip_address,
            user_agent: header_value(headers, header::USER_AGENT.as_str()),
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.chars().take(MAX_HEADER_VALUE_LENGTH).collect())
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Actor::from_headers(&parts.headers, peer))
    }
}
