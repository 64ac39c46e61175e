//! OAuth 2.0 request/response structures

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Authorization request (RFC 6749 section 4.1.1 with PKCE)
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuthorizationRequest {
    /// Client identifier; the project id is used when omitted
    pub client_id: Option<String>,
    /// Must be a URI registered for the client
    pub redirect_uri: Option<String>,
    /// Must be "code" when present
    pub response_type: Option<String>,
    /// PKCE code challenge
    pub code_challenge: Option<String>,
    /// Must be "S256" when present
    pub code_challenge_method: Option<String>,
    pub state: Option<String>,
    /// Requested scopes (space-separated)
    pub scope: Option<String>,
}

/// Token request for the authorization_code and refresh_token grants
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
    /// Requested scopes (space-separated, refresh_token grant)
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Token revocation request (RFC 7009)
#[derive(Debug, Deserialize, ToSchema)]
pub struct RevocationRequest {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Token introspection request (RFC 7662)
#[derive(Debug, Deserialize, ToSchema)]
pub struct IntrospectionRequest {
    pub token: Option<String>,
}

/// Token introspection response (RFC 7662)
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct IntrospectionResponse {
    /// Whether the token is active
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Token scopes (space-separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Token expiration timestamp (Unix time, seconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl IntrospectionResponse {
    pub fn inactive() -> Self {
        Self::default()
    }
}

/// OAuth 2.0 error response
#[derive(Debug, Serialize, ToSchema)]
pub struct OAuthError {
    /// Error code
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Authorization server metadata (RFC 8414)
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub registration_endpoint: String,
    pub revocation_endpoint: String,
    pub introspection_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub revocation_endpoint_auth_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_documentation: Option<String>,
}

impl AuthorizationServerMetadata {
    /// Metadata for an authorization server published at `issuer_url`
    pub fn for_issuer(
        issuer_url: &str,
        default_scope: &str,
        service_documentation: Option<String>,
    ) -> Self {
        let issuer = issuer_url.trim_end_matches('/').to_string();

        Self {
            authorization_endpoint: format!("{issuer}/authorize"),
            token_endpoint: format!("{issuer}/token"),
            registration_endpoint: format!("{issuer}/register"),
            revocation_endpoint: format!("{issuer}/revoke"),
            introspection_endpoint: format!("{issuer}/introspect"),
            response_types_supported: strings(&["code"]),
            grant_types_supported: strings(&["authorization_code", "refresh_token"]),
            code_challenge_methods_supported: strings(&["S256"]),
            token_endpoint_auth_methods_supported: strings(&["client_secret_post", "none"]),
            revocation_endpoint_auth_methods_supported: strings(&["client_secret_post", "none"]),
            scopes_supported: default_scope.split_whitespace().map(str::to_string).collect(),
            service_documentation,
            issuer,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
