use crate::auth::provider::ProviderError;
use crate::config::{BridgeConfig, ClientStoreKind};
use crate::idp::IdpClient;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod idp;
pub mod memory;

/// OAuth client registration (RFC 7591 client metadata)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ClientRegistration {
    /// Empty on a dynamic registration request; assigned before the registration is stored
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    pub redirect_uris: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id_issued_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<String>>,
}

impl ClientRegistration {
    /// A bare registration carrying only a client id
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    pub fn has_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}

/// Store of OAuth client registrations keyed by client id.
///
/// A missing client is `Ok(None)`; errors are reserved for failures of the backing store.
#[async_trait::async_trait]
pub trait ClientStore: Send + Sync {
    async fn get_client(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientRegistration>, ProviderError>;

    /// Stores a registration under its client id and returns it. Last write wins.
    async fn register_client(
        &self,
        registration: ClientRegistration,
    ) -> Result<ClientRegistration, ProviderError>;

    /// Whether the store assigns client ids itself
    fn issues_client_ids(&self) -> bool;
}

/// Client store selected by configuration
#[derive(Clone)]
pub enum ClientRegistry {
    InMemory(memory::InMemoryClientStore),
    /// Registrations are created as third-party applications at the identity provider
    Idp(idp::IdpClientStore),
}

#[async_trait::async_trait]
impl ClientStore for ClientRegistry {
    async fn get_client(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientRegistration>, ProviderError> {
        match self {
            Self::InMemory(store) => store.get_client(client_id).await,
            Self::Idp(store) => store.get_client(client_id).await,
        }
    }

    async fn register_client(
        &self,
        registration: ClientRegistration,
    ) -> Result<ClientRegistration, ProviderError> {
        match self {
            Self::InMemory(store) => store.register_client(registration).await,
            Self::Idp(store) => store.register_client(registration).await,
        }
    }

    fn issues_client_ids(&self) -> bool {
        match self {
            Self::InMemory(store) => store.issues_client_ids(),
            Self::Idp(store) => store.issues_client_ids(),
        }
    }
}

/// Creates the client store named by `BRIDGE_OAUTH__CLIENT_STORE`
pub fn create_client_registry(config: &BridgeConfig, idp_client: &IdpClient) -> ClientRegistry {
    match config.oauth.client_store {
        ClientStoreKind::Memory => ClientRegistry::InMemory(memory::InMemoryClientStore::new()),
        ClientStoreKind::Idp => ClientRegistry::Idp(idp::IdpClientStore::new(idp_client.clone())),
    }
}
