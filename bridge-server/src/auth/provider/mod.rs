use crate::auth::clients::{create_client_registry, ClientRegistration};
use crate::auth::{TokenVerifier, VerifyError};
use crate::config::{BridgeConfig, ProviderKind};
use crate::errors::ApiError;
use crate::idp::{IdpClient, IdpError};
use http::StatusCode;
use log::error;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use url::Url;
use utoipa::ToSchema;

pub mod memory;
pub mod proxy;

/// Errors returned by OAuth provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] VerifyError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Identity provider request failed: {0}")]
    Upstream(String),
    /// The identity provider refused an OAuth request; the body is relayed to the client
    #[error("Identity provider rejected the request with HTTP {status}")]
    Rejected { status: StatusCode, body: Value },
    #[error("Application {app_id} was created but could not be loaded")]
    PartialRegistration { app_id: String },
    #[error("{0} is not supported by this provider")]
    Unsupported(&'static str),
}

impl From<IdpError> for ProviderError {
    fn from(e: IdpError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::InvalidToken(_) => ApiError::unauthorized("Invalid token"),
            ProviderError::NotFound(_) => ApiError::not_found(e.to_string()),
            ProviderError::Upstream(ref reason) => {
                error!("Upstream failure: {}", reason);
                ApiError::internal("Identity provider request failed")
            }
            ProviderError::Rejected { status, .. } => {
                ApiError::new("Identity provider rejected the request", status)
            }
            ProviderError::PartialRegistration { ref app_id } => {
                ApiError::internal("server_error").with_description(format!(
                    "Application {app_id} was created but its client id could not be loaded"
                ))
            }
            ProviderError::Unsupported(_) => {
                ApiError::new("unsupported_operation", StatusCode::NOT_IMPLEMENTED)
                    .with_description(e.to_string())
            }
        }
    }
}

/// Parameters of an authorization request once it has been validated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorizationParams {
    pub redirect_uri: String,
    /// PKCE challenge; the method is always S256
    pub code_challenge: String,
    pub state: Option<String>,
    pub scopes: Option<Vec<String>>,
}

/// Result of verifying an access token
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AccessTokenInfo {
    #[serde(skip)]
    pub token: String,
    pub client_id: String,
    pub scopes: BTreeSet<String>,
    /// Seconds since the Unix epoch
    pub expires_at: i64,
    pub subject: String,
}

/// Operations of an OAuth authorization server
#[async_trait::async_trait]
pub trait OAuthServerProvider: Send + Sync {
    async fn verify_access_token(&self, token: &str) -> Result<AccessTokenInfo, ProviderError>;

    /// Returns the URL the user agent is redirected to
    async fn authorize(
        &self,
        client: &ClientRegistration,
        params: &AuthorizationParams,
    ) -> Result<Url, ProviderError>;

    async fn exchange_authorization_code(
        &self,
        client: &ClientRegistration,
        code: &str,
        code_verifier: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> Result<Value, ProviderError>;

    async fn exchange_refresh_token(
        &self,
        client: &ClientRegistration,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<Value, ProviderError>;

    async fn revoke_token(
        &self,
        client: &ClientRegistration,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<(), ProviderError>;

    async fn get_client(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientRegistration>, ProviderError>;

    async fn register_client(
        &self,
        registration: ClientRegistration,
    ) -> Result<ClientRegistration, ProviderError>;

    /// Whether registrations receive their client id from the backing store
    fn issues_client_ids(&self) -> bool;
}

/// OAuth provider selected by `BRIDGE_OAUTH__PROVIDER`
#[derive(Clone)]
pub enum OAuthProvider {
    /// Token verification and local clients only; authorization flows go to the identity provider directly
    InMemory(memory::InMemoryProvider),
    /// Proxies authorization flows to the identity provider
    Proxy(proxy::ProxyProvider),
}

#[async_trait::async_trait]
impl OAuthServerProvider for OAuthProvider {
    async fn verify_access_token(&self, token: &str) -> Result<AccessTokenInfo, ProviderError> {
        match self {
            Self::InMemory(provider) => provider.verify_access_token(token).await,
            Self::Proxy(provider) => provider.verify_access_token(token).await,
        }
    }

    async fn authorize(
        &self,
        client: &ClientRegistration,
        params: &AuthorizationParams,
    ) -> Result<Url, ProviderError> {
        match self {
            Self::InMemory(provider) => provider.authorize(client, params).await,
            Self::Proxy(provider) => provider.authorize(client, params).await,
        }
    }

    async fn exchange_authorization_code(
        &self,
        client: &ClientRegistration,
        code: &str,
        code_verifier: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> Result<Value, ProviderError> {
        match self {
            Self::InMemory(provider) => {
                provider
                    .exchange_authorization_code(client, code, code_verifier, redirect_uri)
                    .await
            }
            Self::Proxy(provider) => {
                provider
                    .exchange_authorization_code(client, code, code_verifier, redirect_uri)
                    .await
            }
        }
    }

    async fn exchange_refresh_token(
        &self,
        client: &ClientRegistration,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<Value, ProviderError> {
        match self {
            Self::InMemory(provider) => {
                provider
                    .exchange_refresh_token(client, refresh_token, scopes)
                    .await
            }
            Self::Proxy(provider) => {
                provider
                    .exchange_refresh_token(client, refresh_token, scopes)
                    .await
            }
        }
    }

    async fn revoke_token(
        &self,
        client: &ClientRegistration,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<(), ProviderError> {
        match self {
            Self::InMemory(provider) => provider.revoke_token(client, token, token_type_hint).await,
            Self::Proxy(provider) => provider.revoke_token(client, token, token_type_hint).await,
        }
    }

    async fn get_client(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientRegistration>, ProviderError> {
        match self {
            Self::InMemory(provider) => provider.get_client(client_id).await,
            Self::Proxy(provider) => provider.get_client(client_id).await,
        }
    }

    async fn register_client(
        &self,
        registration: ClientRegistration,
    ) -> Result<ClientRegistration, ProviderError> {
        match self {
            Self::InMemory(provider) => provider.register_client(registration).await,
            Self::Proxy(provider) => provider.register_client(registration).await,
        }
    }

    fn issues_client_ids(&self) -> bool {
        match self {
            Self::InMemory(provider) => provider.issues_client_ids(),
            Self::Proxy(provider) => provider.issues_client_ids(),
        }
    }
}

/// Builds the provider named by the configuration.
///
/// The in-memory provider always keeps its clients in memory; the proxy provider uses
/// the store named by `BRIDGE_OAUTH__CLIENT_STORE`.
pub fn create_provider(
    config: &BridgeConfig,
    idp_client: &IdpClient,
    verifier: Arc<dyn TokenVerifier>,
) -> OAuthProvider {
    match config.oauth.provider {
        ProviderKind::InMemory => OAuthProvider::InMemory(memory::InMemoryProvider::new(
            verifier,
            config.idp.project_id.clone(),
        )),
        ProviderKind::Proxy => OAuthProvider::Proxy(proxy::ProxyProvider::new(
            idp_client.clone(),
            verifier,
            create_client_registry(config, idp_client),
            config.oauth.clone(),
        )),
    }
}

/// Converts verified identity into the view exposed to OAuth callers
pub(crate) async fn verify_with(
    verifier: &dyn TokenVerifier,
    project_id: &str,
    token: &str,
) -> Result<AccessTokenInfo, ProviderError> {
    let info = verifier.verify(token).await?;
    Ok(AccessTokenInfo {
        token: info.token,
        client_id: project_id.to_string(),
        scopes: info.scopes,
        expires_at: info.expires_at,
        subject: info.subject_id,
    })
}
