//! OAuth 2.0 endpoint handlers

use crate::api::extract::{FormOrJson, JsonBody, QueryParams};
use crate::api::oauth::models::{
    AuthorizationRequest, AuthorizationServerMetadata, IntrospectionRequest,
    IntrospectionResponse, OAuthError, RevocationRequest, TokenRequest,
};
use crate::auth::clients::ClientRegistration;
use crate::auth::provider::{AuthorizationParams, OAuthServerProvider, ProviderError};
use crate::errors::ApiError;
use crate::headers::presets;
use crate::openapi::OAUTH_TAG;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use log::{debug, info, warn};
use rand::Rng;
use serde_json::Value;
use url::Url;

/// Metadata documents change only on redeploy
const METADATA_MAX_AGE: u32 = 3600;

fn invalid_request(description: &str) -> ApiError {
    ApiError::bad_request("invalid_request").with_description(description)
}

/// Generates a URL-safe client id from 16 random bytes
fn generate_client_id() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..16).map(|_| rng.r#gen()).collect();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Turns a token endpoint outcome into a response, relaying identity provider rejections verbatim
fn token_response(result: Result<Value, ProviderError>) -> Result<Response, ApiError> {
    let mut response = match result {
        Ok(tokens) => Json(tokens).into_response(),
        Err(ProviderError::Rejected { status, body }) => (status, Json(body)).into_response(),
        Err(e) => return Err(e.into()),
    };
    presets::no_store().apply(&mut response);
    Ok(response)
}

/// Authorization endpoint (RFC 6749 section 4.1.1)
///
/// Validates the request against the client's registration and redirects the user agent
/// to the identity provider's authorize endpoint.
#[utoipa::path(
    get,
    path = "/authorize",
    params(AuthorizationRequest),
    responses(
        (status = 302, description = "Redirect to the identity provider"),
        (status = 400, description = "Invalid request", body = OAuthError),
        (status = 404, description = "Unknown client", body = OAuthError),
        (status = 500, description = "Internal server error", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn authorize(
    State(state): State<AppState>,
    QueryParams(request): QueryParams<AuthorizationRequest>,
) -> Result<Response, ApiError> {
    if let Some(response_type) = request.response_type.as_deref() {
        if response_type != "code" {
            return Err(ApiError::bad_request("unsupported_response_type")
                .with_description("Only the code response type is supported"));
        }
    }

    let redirect_uri = match request.redirect_uri.as_deref() {
        Some(uri) if !uri.is_empty() => uri.to_string(),
        _ => return Err(invalid_request("redirect_uri is required")),
    };
    if Url::parse(&redirect_uri).is_err() {
        return Err(invalid_request("redirect_uri is not a valid URL"));
    }

    let code_challenge = match request.code_challenge.as_deref() {
        Some(challenge) if !challenge.is_empty() => challenge.to_string(),
        _ => return Err(invalid_request("code_challenge is required")),
    };
    if let Some(method) = request.code_challenge_method.as_deref() {
        if method != "S256" {
            return Err(invalid_request("code_challenge_method must be S256"));
        }
    }

    let client = match request.client_id.as_deref().filter(|id| !id.is_empty()) {
        Some(client_id) => {
            let client = state.provider.get_client(client_id).await?.ok_or_else(|| {
                warn!("Authorization request for unknown client {}", client_id);
                ApiError::not_found("invalid_client")
                    .with_description(format!("Client {client_id} is not registered"))
            })?;
            if !client.has_redirect_uri(&redirect_uri) {
                warn!(
                    "Redirect URI {} is not registered for client {}",
                    redirect_uri, client_id
                );
                return Err(invalid_request("Unregistered redirect_uri"));
            }
            client
        }
        // The identity provider validates the redirect for its default client
        None => ClientRegistration::default(),
    };

    let params = AuthorizationParams {
        redirect_uri,
        code_challenge,
        state: request.state,
        scopes: request
            .scope
            .map(|scope| scope.split_whitespace().map(str::to_string).collect()),
    };

    let url = state.provider.authorize(&client, &params).await?;
    Ok((StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response())
}

/// Token endpoint, forwarded to the identity provider
#[utoipa::path(
    post,
    path = "/token",
    request_body(content = TokenRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token response from the identity provider"),
        (status = 400, description = "Invalid request", body = OAuthError),
        (status = 500, description = "Internal server error", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn token(
    State(state): State<AppState>,
    FormOrJson(request): FormOrJson<TokenRequest>,
) -> Result<Response, ApiError> {
    let client = ClientRegistration {
        client_id: request.client_id.unwrap_or_default(),
        client_secret: request.client_secret,
        ..Default::default()
    };
    let grant_type = request.grant_type.unwrap_or_default();
    debug!(
        "Token request with grant_type '{}' from client '{}'",
        grant_type, client.client_id
    );

    let result = match grant_type.as_str() {
        "authorization_code" => {
            let code = request
                .code
                .ok_or_else(|| invalid_request("code is required"))?;
            state
                .provider
                .exchange_authorization_code(
                    &client,
                    &code,
                    request.code_verifier.as_deref(),
                    request.redirect_uri.as_deref(),
                )
                .await
        }
        "refresh_token" => {
            let refresh_token = request
                .refresh_token
                .ok_or_else(|| invalid_request("refresh_token is required"))?;
            let scopes: Vec<String> = request
                .scope
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect();
            state
                .provider
                .exchange_refresh_token(&client, &refresh_token, &scopes)
                .await
        }
        "" => return Err(invalid_request("grant_type is required")),
        other => {
            warn!("Unsupported grant type '{}'", other);
            return Err(ApiError::bad_request("unsupported_grant_type"));
        }
    };

    token_response(result)
}

/// Token revocation endpoint (RFC 7009), forwarded to the identity provider
#[utoipa::path(
    post,
    path = "/revoke",
    request_body(content = RevocationRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token revoked"),
        (status = 400, description = "Invalid request", body = OAuthError),
        (status = 500, description = "Internal server error", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn revoke(
    State(state): State<AppState>,
    FormOrJson(request): FormOrJson<RevocationRequest>,
) -> Result<Response, ApiError> {
    let token = request
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| invalid_request("token is required"))?;
    let client = ClientRegistration {
        client_id: request.client_id.unwrap_or_default(),
        client_secret: request.client_secret,
        ..Default::default()
    };

    match state
        .provider
        .revoke_token(&client, &token, request.token_type_hint.as_deref())
        .await
    {
        Ok(()) => Ok(StatusCode::OK.into_response()),
        Err(ProviderError::Rejected { status, body }) => Ok((status, Json(body)).into_response()),
        Err(e) => Err(e.into()),
    }
}

/// Dynamic client registration (RFC 7591)
#[utoipa::path(
    post,
    path = "/register",
    request_body = ClientRegistration,
    responses(
        (status = 201, description = "Client registered", body = ClientRegistration),
        (status = 400, description = "Invalid client metadata", body = OAuthError),
        (status = 500, description = "Internal server error", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(metadata): JsonBody<Value>,
) -> Result<(StatusCode, Json<ClientRegistration>), ApiError> {
    let invalid_metadata = |description: String| {
        ApiError::bad_request("invalid_client_metadata").with_description(description)
    };

    let mut registration: ClientRegistration =
        serde_json::from_value(metadata).map_err(|e| invalid_metadata(e.to_string()))?;
    if registration.redirect_uris.is_empty() {
        return Err(invalid_metadata("redirect_uris must not be empty".to_string()));
    }
    if let Some(uri) = registration
        .redirect_uris
        .iter()
        .find(|uri| Url::parse(uri).is_err())
    {
        return Err(invalid_metadata(format!("{uri} is not a valid URL")));
    }

    // Client ids are always issued by the server, never taken from the caller
    registration.client_id = if state.provider.issues_client_ids() {
        String::new()
    } else {
        generate_client_id()
    };
    registration.client_id_issued_at = Some(Utc::now().timestamp());

    let registration = state.provider.register_client(registration).await?;
    info!(
        "Registered client {} ({})",
        registration.client_id,
        registration.client_name.as_deref().unwrap_or("unnamed")
    );
    Ok((StatusCode::CREATED, Json(registration)))
}

/// Token introspection (RFC 7662) backed by the token verifier
#[utoipa::path(
    post,
    path = "/introspect",
    request_body(content = IntrospectionRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Introspection result", body = IntrospectionResponse),
        (status = 400, description = "Invalid request", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn introspect(
    State(state): State<AppState>,
    FormOrJson(request): FormOrJson<IntrospectionRequest>,
) -> Result<Json<IntrospectionResponse>, ApiError> {
    let token = request
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| invalid_request("token is required"))?;

    match state.provider.verify_access_token(&token).await {
        Ok(info) => Ok(Json(IntrospectionResponse {
            active: true,
            client_id: Some(info.client_id),
            scope: Some(info.scopes.into_iter().collect::<Vec<_>>().join(" ")),
            exp: Some(info.expires_at),
            sub: Some(info.subject),
            token_type: Some("Bearer".to_string()),
        })),
        Err(ProviderError::InvalidToken(e)) => {
            debug!("Introspected token is not active: {}", e);
            Ok(Json(IntrospectionResponse::inactive()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Authorization server metadata (RFC 8414)
///
/// Serves the identity provider's document when `BRIDGE_IDP__METADATA_URL` is set, otherwise
/// metadata describing this server's own endpoints.
#[utoipa::path(
    get,
    path = "/.well-known/oauth-authorization-server",
    responses(
        (status = 200, description = "Authorization server metadata", body = AuthorizationServerMetadata),
        (status = 500, description = "Upstream metadata unavailable", body = OAuthError)
    ),
    tag = OAUTH_TAG
)]
pub async fn metadata(State(state): State<AppState>) -> Result<Response, ApiError> {
    let mut response = match &state.config.idp.metadata_url {
        Some(url) => {
            let document = state
                .idp
                .fetch_json(url)
                .await
                .map_err(ProviderError::from)?;
            Json(document).into_response()
        }
        None => Json(AuthorizationServerMetadata::for_issuer(
            &state.config.issuer_url,
            &state.config.oauth.default_scope,
            state.config.service_documentation_url.clone(),
        ))
        .into_response(),
    };
    presets::public_cache(METADATA_MAX_AGE).apply(&mut response);
    Ok(response)
}
