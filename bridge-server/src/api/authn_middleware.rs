use crate::errors::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::WWW_AUTHENTICATE, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use log::{debug, warn};

/// Extracts the token from an `Authorization: Bearer <token>` header
fn bearer_token(request: &Request<Body>) -> Option<&str> {
    let header = request
        .headers()
        .get(http::header::AUTHORIZATION)?
        .to_str()
        .ok()?;
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn unauthorized(message: &str) -> Response {
    let mut response = ApiError::unauthorized(message).into_response();
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

/// Verifies the bearer token and attaches the caller's `AuthInfo` to the request
pub(super) async fn authentication_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        warn!("Missing bearer token on {}", request.uri().path());
        return unauthorized("Missing bearer token");
    };

    let auth = match state.verifier.verify(token).await {
        Ok(auth) => auth,
        Err(e) => {
            warn!("Authentication failed: {}", e);
            return unauthorized("Invalid token");
        }
    };

    debug!("Authenticated subject {}", auth.subject_id);
    request.extensions_mut().insert(auth);
    next.run(request).await
}
