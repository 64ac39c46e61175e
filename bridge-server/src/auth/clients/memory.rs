use crate::auth::clients::{ClientRegistration, ClientStore};
use crate::auth::provider::ProviderError;
use async_trait::async_trait;
use dashmap::DashMap;
use log::info;
use std::sync::Arc;

/// Process-local client registrations. Nothing is persisted.
#[derive(Clone, Default)]
pub struct InMemoryClientStore {
    clients: Arc<DashMap<String, ClientRegistration>>,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn get_client(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientRegistration>, ProviderError> {
        Ok(self
            .clients
            .get(client_id)
            .map(|entry| entry.value().clone()))
    }

    async fn register_client(
        &self,
        registration: ClientRegistration,
    ) -> Result<ClientRegistration, ProviderError> {
        info!("Registered client {}", registration.client_id);
        self.clients
            .insert(registration.client_id.clone(), registration.clone());
        Ok(registration)
    }

    fn issues_client_ids(&self) -> bool {
        false
    }
}
