use crate::auth::provider::{create_provider, OAuthProvider};
use crate::auth::{IdpTokenVerifier, TokenVerifier};
use crate::config::{BridgeConfig, IdpConfig};
use crate::idp::IdpClient;
use crate::protocol::{BasicProtocolServer, ProtocolServer, SessionContext};
use reqwest::Client;
use sse_session::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub idp: IdpClient,
    pub verifier: Arc<dyn TokenVerifier>,
    pub provider: Arc<OAuthProvider>,
    pub sessions: SessionRegistry<SessionContext>,
    pub protocol: Arc<dyn ProtocolServer>,
}

impl AppState {
    fn create_idp_http_client(config: &IdpConfig) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            // Configure connection pool
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
    }

    pub fn new(config: BridgeConfig) -> Result<Self, reqwest::Error> {
        let http_client = Self::create_idp_http_client(&config.idp)?;
        let idp = IdpClient::new(http_client, config.idp.clone());
        let verifier: Arc<dyn TokenVerifier> = Arc::new(IdpTokenVerifier::new(idp.clone()));
        let provider = create_provider(&config, &idp, Arc::clone(&verifier));
        let sessions = SessionRegistry::new(config.sse.session_options());

        Ok(Self {
            config: Arc::new(config),
            idp,
            verifier,
            provider: Arc::new(provider),
            sessions,
            protocol: Arc::new(BasicProtocolServer),
        })
    }
}
