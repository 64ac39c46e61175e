use crate::auth::clients::{ClientRegistration, ClientRegistry, ClientStore};
use crate::auth::provider::{
    verify_with, AccessTokenInfo, AuthorizationParams, OAuthServerProvider, ProviderError,
};
use crate::auth::TokenVerifier;
use crate::config::OAuthConfig;
use crate::idp::{IdpClient, RelayedResponse};
use async_trait::async_trait;
use log::{debug, error, warn};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Proxies the OAuth flows to the identity provider's OAuth endpoints
#[derive(Clone)]
pub struct ProxyProvider {
    idp: IdpClient,
    verifier: Arc<dyn TokenVerifier>,
    clients: ClientRegistry,
    oauth: OAuthConfig,
}

impl ProxyProvider {
    pub fn new(
        idp: IdpClient,
        verifier: Arc<dyn TokenVerifier>,
        clients: ClientRegistry,
        oauth: OAuthConfig,
    ) -> Self {
        Self {
            idp,
            verifier,
            clients,
            oauth,
        }
    }

    /// Client credentials for a forwarded form; the project id stands in for a missing client id
    fn client_form(&self, client: &ClientRegistration) -> Vec<(String, String)> {
        let client_id = if client.client_id.is_empty() {
            self.idp.project_id().to_string()
        } else {
            client.client_id.clone()
        };
        let mut form = vec![("client_id".to_string(), client_id)];
        if let Some(secret) = &client.client_secret {
            form.push(("client_secret".to_string(), secret.clone()));
        }
        form
    }

    async fn forward(
        &self,
        url: &str,
        form: Vec<(String, String)>,
    ) -> Result<RelayedResponse, ProviderError> {
        let relayed = self.idp.post_form(url, &form).await?;
        let status = relayed.status;

        if status.is_success() {
            return Ok(relayed);
        }
        if status.is_client_error() && !relayed.body.is_null() {
            warn!("Identity provider rejected request to {} with {}", url, status);
            return Err(ProviderError::Rejected {
                status,
                body: relayed.body,
            });
        }
        error!("Identity provider returned {} for {}", status, url);
        Err(ProviderError::Upstream(format!("HTTP {status} from {url}")))
    }

    async fn forward_token_request(
        &self,
        form: Vec<(String, String)>,
    ) -> Result<Value, ProviderError> {
        let relayed = self.forward(&self.idp.config().token_url(), form).await?;
        if !relayed.body.is_object() {
            return Err(ProviderError::Upstream(
                "token endpoint returned no token response".to_string(),
            ));
        }
        Ok(relayed.body)
    }
}

#[async_trait]
impl OAuthServerProvider for ProxyProvider {
    async fn verify_access_token(&self, token: &str) -> Result<AccessTokenInfo, ProviderError> {
        verify_with(self.verifier.as_ref(), self.idp.project_id(), token).await
    }

    async fn authorize(
        &self,
        client: &ClientRegistration,
        params: &AuthorizationParams,
    ) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.idp.config().authorize_url())
            .map_err(|e| ProviderError::Upstream(format!("Invalid authorize URL: {e}")))?;

        let state = params
            .state
            .as_deref()
            .filter(|state| !state.is_empty())
            .unwrap_or(&self.oauth.default_state);
        let scope = match &params.scopes {
            Some(scopes) if !scopes.is_empty() => scopes.join(" "),
            _ => self.oauth.default_scope.clone(),
        };

        let client_id: &str = if client.client_id.is_empty() {
            self.idp.project_id()
        } else {
            &client.client_id
        };

        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &params.redirect_uri)
            .append_pair("code_challenge", &params.code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", state)
            .append_pair("scope", &scope);

        debug!("Redirecting client {} to the identity provider", client_id);
        Ok(url)
    }

    async fn exchange_authorization_code(
        &self,
        client: &ClientRegistration,
        code: &str,
        code_verifier: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> Result<Value, ProviderError> {
        let mut form = vec![
            ("grant_type".to_string(), "authorization_code".to_string()),
            ("code".to_string(), code.to_string()),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier".to_string(), verifier.to_string()));
        }
        if let Some(redirect_uri) = redirect_uri {
            form.push(("redirect_uri".to_string(), redirect_uri.to_string()));
        }
        form.extend(self.client_form(client));

        self.forward_token_request(form).await
    }

    async fn exchange_refresh_token(
        &self,
        client: &ClientRegistration,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<Value, ProviderError> {
        let mut form = vec![
            ("grant_type".to_string(), "refresh_token".to_string()),
            ("refresh_token".to_string(), refresh_token.to_string()),
        ];
        if !scopes.is_empty() {
            form.push(("scope".to_string(), scopes.join(" ")));
        }
        form.extend(self.client_form(client));

        self.forward_token_request(form).await
    }

    async fn revoke_token(
        &self,
        client: &ClientRegistration,
        token: &str,
        token_type_hint: Option<&str>,
    ) -> Result<(), ProviderError> {
        let mut form = vec![("token".to_string(), token.to_string())];
        if let Some(hint) = token_type_hint {
            form.push(("token_type_hint".to_string(), hint.to_string()));
        }
        form.extend(self.client_form(client));

        self.forward(&self.idp.config().revoke_url(), form).await?;
        Ok(())
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
