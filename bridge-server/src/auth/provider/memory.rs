use crate::auth::clients::memory::InMemoryClientStore;
use crate::auth::clients::{ClientRegistration, ClientStore};
use crate::auth::provider::{
    verify_with, AccessTokenInfo, AuthorizationParams, OAuthServerProvider, ProviderError,
};
use crate::auth::TokenVerifier;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Verifies tokens and keeps clients in memory.
///
/// Authorization, token and revocation requests are answered by the identity provider
/// itself, so those operations are not offered here.
#[derive(Clone)]
pub struct InMemoryProvider {
    verifier: Arc<dyn TokenVerifier>,
    clients: InMemoryClientStore,
    project_id: String,
}

impl InMemoryProvider {
    pub fn new(verifier: Arc<dyn TokenVerifier>, project_id: String) -> Self {
        Self {
            verifier,
            clients: InMemoryClientStore::new(),
            project_id,
        }
    }
}

#[async_trait]
impl OAuthServerProvider for InMemoryProvider {
    async fn verify_access_token(&self, token: &str) -> Result<AccessTokenInfo, ProviderError> {
        verify_with(self.verifier.as_ref(), &self.project_id, token).await
    }

    async fn authorize(
        &self,
        _client: &ClientRegistration,
        _params: &AuthorizationParams,
    ) -> Result<Url, ProviderError> {
        Err(ProviderError::Unsupported("authorize"))
    }

    async fn exchange_authorization_code(
        &self,
        _client: &ClientRegistration,
        _code: &str,
        _code_verifier: Option<&str>,
        _redirect_uri: Option<&str>,
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::Unsupported("authorization_code grant"))
    }

    async fn exchange_refresh_token(
        &self,
        _client: &ClientRegistration,
        _refresh_token: &str,
        _scopes: &[String],
    ) -> Result<Value, ProviderError> {
        Err(ProviderError::Unsupported("refresh_token grant"))
    }

    async fn revoke_token(
        &self,
        _client: &ClientRegistration,
        _token: &str,
        _token_type_hint: Option<&str>,
    ) -> Result<(), ProviderError> {
        Err(ProviderError::Unsupported("token revocation"))
    }

    async fn get_client(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientRegistration>, ProviderError> {
        self.clients.get_client(client_id).await
    }

    async fn register_client(
        &self,
        registration: ClientRegistration,
    ) -> Result<ClientRegistration, ProviderError> {
        self.clients.register_client(registration).await
    }

    fn issues_client_ids(&self) -> bool {
        self.clients.issues_client_ids()
    }
}
