pub(crate) use crate::config::idp::IdpConfig;
pub(crate) use crate::config::oauth::{ClientStoreKind, OAuthConfig, ProviderKind};
pub(crate) use crate::config::sse::SseConfig;
use config::{Config as ConfigCrate, Environment};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub mod idp;
pub mod oauth;
pub mod sse;

/// Errors raised while loading the configuration. All of them are fatal at startup.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),
    #[error("{0} is required but not set")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Main configuration structure for the bridge server
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BridgeConfig {
    /// The port the server will listen to (default: 3001)
    pub port: u16,

    /// Public base URL of this server, advertised as the OAuth issuer
    /// (default: http://localhost:3001)
    pub issuer_url: String,

    /// Optional documentation link advertised in the authorization server metadata
    pub service_documentation_url: Option<String>,

    /// Identity provider connection settings
    pub idp: IdpConfig,

    /// OAuth provider behaviour
    pub oauth: OAuthConfig,

    /// Streaming session settings
    pub sse: SseConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            issuer_url: "http://localhost:3001".to_string(),
            service_documentation_url: None,
            idp: IdpConfig::default(),
            oauth: OAuthConfig::default(),
            sse: SseConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Creates a new Config instance from `BRIDGE_*` environment variables.
    /// Nested sections are separated by a double underscore, e.g. `BRIDGE_IDP__PROJECT_ID`.
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_env(Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix("BRIDGE")
            .prefix_separator("_")
            .separator("__")
    }

    fn from_env(source: Environment) -> Result<Self, ConfigError> {
        let config: Self = ConfigCrate::builder()
            .add_source(source)
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that have no usable default
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idp.project_id.trim().is_empty() {
            return Err(ConfigError::Missing("BRIDGE_IDP__PROJECT_ID"));
        }
        if self.idp.management_key.trim().is_empty() {
            return Err(ConfigError::Missing("BRIDGE_IDP__MANAGEMENT_KEY"));
        }
        Url::parse(&self.issuer_url).map_err(|e| ConfigError::Invalid {
            name: "BRIDGE_ISSUER_URL",
            reason: e.to_string(),
        })?;
        Url::parse(&self.idp.base_url).map_err(|e| ConfigError::Invalid {
            name: "BRIDGE_IDP__BASE_URL",
            reason: e.to_string(),
        })?;
        if !self.sse.endpoint.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "BRIDGE_SSE__ENDPOINT",
                reason: "must be an absolute path".to_string(),
            });
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(idp_mock: &wiremock::MockServer) -> Self {
        Self {
            port: 0, // Let the OS choose a port
            issuer_url: "http://localhost:3001".to_string(),
            service_documentation_url: Some("https://docs.example.com/".to_string()),
            idp: IdpConfig {
                project_id: "P2test".to_string(),
                management_key: "test-management-key".to_string(),
                base_url: idp_mock.uri(),
                request_timeout: 5,
                connect_timeout: 1,
                metadata_url: None,
            },
            oauth: OAuthConfig::default(),
            sse: SseConfig::default(),
        }
    }
}
