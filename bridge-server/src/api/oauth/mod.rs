//! OAuth 2.0 authorization server endpoints backed by the external identity provider
//!
//! ## Supported flows
//! - Authorization Code with PKCE (S256), proxied to the identity provider
//! - Refresh Token, proxied to the identity provider
//! - Token Revocation (RFC 7009) and Introspection (RFC 7662)
//! - Dynamic Client Registration (RFC 7591)
//! - Authorization Server Metadata (RFC 8414)

pub mod handlers;
pub mod models;

use crate::state::AppState;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates OAuth 2.0 routes. Browser-based clients call them cross-origin.
pub(super) fn router() -> OpenApiRouter<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    OpenApiRouter::new()
        .routes(routes!(handlers::authorize))
        .routes(routes!(handlers::token))
        .routes(routes!(handlers::revoke))
        .routes(routes!(handlers::register))
        .routes(routes!(handlers::metadata))
        .layer(cors)
        .routes(routes!(handlers::introspect))
}
