//! OAuth provider configuration

use serde::Deserialize;

/// Which provider implementation backs the authorization server routes
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Verifies tokens against the identity provider and keeps clients in memory.
    /// Authorization flows are served by the identity provider directly.
    InMemory,
    /// Proxies authorize, token and revoke to the identity provider
    #[default]
    Proxy,
}

/// Where the proxy provider keeps client registrations
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ClientStoreKind {
    Memory,
    /// Registers third-party applications at the identity provider
    #[default]
    Idp,
}

/// OAuth 2.0 configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OAuthConfig {
    /// Provider implementation: "proxy" (default) or "in-memory"
    pub provider: ProviderKind,

    /// Client registration store for the proxy provider: "idp" (default) or "memory"
    pub client_store: ClientStoreKind,

    /// Scope sent to the identity provider when the client asked for none (default: "openid")
    pub default_scope: String,

    /// State sent to the identity provider when the client sent none (default: "bridge-state")
    pub default_state: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            client_store: ClientStoreKind::default(),
            default_scope: "openid".to_string(),
            default_state: "bridge-state".to_string(),
        }
    }
}
