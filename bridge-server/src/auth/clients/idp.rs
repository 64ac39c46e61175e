use crate::auth::clients::{ClientRegistration, ClientStore};
use crate::auth::provider::ProviderError;
use crate::idp::models::{CreateAppRequest, IdpApp};
use crate::idp::{IdpClient, IdpError};
use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, error, info};
use std::sync::Arc;

const UNNAMED_CLIENT: &str = "Unnamed client";

/// Registers clients as third-party applications at the identity provider.
///
/// Registrations made through this process are also recorded locally so that the
/// full client metadata survives; the identity provider only keeps name and callbacks.
/// Clients registered elsewhere are loaded on every lookup, so callback changes made at
/// the identity provider take effect immediately.
#[derive(Clone)]
pub struct IdpClientStore {
    idp: IdpClient,
    local: Arc<DashMap<String, ClientRegistration>>,
}

impl IdpClientStore {
    pub fn new(idp: IdpClient) -> Self {
        Self {
            idp,
            local: Arc::new(DashMap::new()),
        }
    }
}

impl From<IdpApp> for ClientRegistration {
    fn from(app: IdpApp) -> Self {
        Self {
            client_id: app.client_id,
            redirect_uris: app.approved_callback_urls,
            client_name: app.name,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ClientStore for IdpClientStore {
    async fn get_client(
        &self,
        client_id: &str,
    ) -> Result<Option<ClientRegistration>, ProviderError> {
        if let Some(entry) = self.local.get(client_id) {
            return Ok(Some(entry.value().clone()));
        }

        match self.idp.load_app_by_client_id(client_id).await {
            Ok(app) => {
                debug!("Loaded client {} from the identity provider", client_id);
                Ok(Some(ClientRegistration::from(app)))
            }
            Err(IdpError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn register_client(
        &self,
        registration: ClientRegistration,
    ) -> Result<ClientRegistration, ProviderError> {
        let request = CreateAppRequest {
            name: registration
                .client_name
                .clone()
                .unwrap_or_else(|| UNNAMED_CLIENT.to_string()),
            approved_callback_urls: registration.redirect_uris.clone(),
            login_page_url: self.idp.config().login_page_url(),
        };
        let created = self.idp.create_app(&request).await?;

        let app = match self.idp.load_app(&created.id).await {
            Ok(app) => app,
            Err(e) => {
                error!(
                    "Application {} was created but loading it failed, it is left orphaned: {}",
                    created.id, e
                );
                return Err(ProviderError::PartialRegistration { app_id: created.id });
            }
        };

        let registration = ClientRegistration {
            client_id: app.client_id,
            ..registration
        };
        self.local
            .insert(registration.client_id.clone(), registration.clone());
        info!(
            "Registered client {} as application {}",
            registration.client_id, created.id
        );
        Ok(registration)
    }

    fn issues_client_ids(&self) -> bool {
        true
    }
}
