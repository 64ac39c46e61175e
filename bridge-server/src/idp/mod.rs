//! Identity provider API client
//!
//! Every outbound call to the identity provider goes through [`IdpClient`]: session
//! validation, third-party app management, and the OAuth token/revoke endpoints.

pub mod models;

use crate::config::IdpConfig;
use crate::idp::models::{
    CreateAppRequest, CreatedApp, IdpApp, LoadAppResponse, ValidatedSession,
};
use http::header::AUTHORIZATION;
use http::StatusCode;
use log::{debug, error};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors that can occur during identity provider calls
#[derive(Debug, Error)]
pub enum IdpError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Identity provider returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("Malformed identity provider response: {0}")]
    Malformed(String),
    #[error("Not found at identity provider: {0}")]
    NotFound(String),
}

/// Status and JSON body of a relayed OAuth call
#[derive(Debug, Clone)]
pub struct RelayedResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Identity provider API client
#[derive(Clone)]
pub struct IdpClient {
    client: Client,
    config: IdpConfig,
}

impl IdpClient {
    /// Create a new identity provider client
    pub fn new(client: Client, config: IdpConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &IdpConfig {
        &self.config
    }

    pub fn project_id(&self) -> &str {
        &self.config.project_id
    }

    fn management_auth(&self) -> String {
        format!(
            "Bearer {}:{}",
            self.config.project_id, self.config.management_key
        )
    }

    /// Validate a session token. The token is never logged.
    pub async fn validate_session(&self, token: &str) -> Result<ValidatedSession, IdpError> {
        let url = self.config.get_url("/v1/auth/validate");
        debug!("Validating session token at {}", url);

        let response = self
            .client
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}:{}", self.config.project_id, token),
            )
            .json(&json!({}))
            .send()
            .await?;

        parse_json(ensure_success(response).await?).await
    }

    /// Create a third-party application; returns the application id
    pub async fn create_app(&self, request: &CreateAppRequest) -> Result<CreatedApp, IdpError> {
        let url = self.config.get_url("/v1/mgmt/thirdparty/app/create");
        debug!("Creating third-party app '{}'", request.name);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.management_auth())
            .json(request)
            .send()
            .await?;

        let created: CreatedApp = parse_json(ensure_success(response).await?).await?;
        if created.id.is_empty() {
            return Err(IdpError::Malformed(
                "app creation returned an empty id".to_string(),
            ));
        }
        debug!("Created third-party app {}", created.id);
        Ok(created)
    }

    /// Load a third-party application by its application id
    pub async fn load_app(&self, app_id: &str) -> Result<IdpApp, IdpError> {
        self.load_app_by("id", app_id).await
    }

    /// Load a third-party application by its OAuth client id
    pub async fn load_app_by_client_id(&self, client_id: &str) -> Result<IdpApp, IdpError> {
        self.load_app_by("clientId", client_id).await
    }

    async fn load_app_by(&self, key: &str, value: &str) -> Result<IdpApp, IdpError> {
        let url = self.config.get_url("/v1/mgmt/thirdparty/app/load");
        debug!("Loading third-party app by {}={}", key, value);

        let response = self
            .client
            .get(&url)
            .query(&[(key, value)])
            .header(AUTHORIZATION, self.management_auth())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(IdpError::NotFound(format!("app with {key}={value}")));
        }

        let loaded: LoadAppResponse = parse_json(ensure_success(response).await?).await?;
        if loaded.app.client_id.is_empty() {
            return Err(IdpError::Malformed(
                "loaded app has an empty clientId".to_string(),
            ));
        }
        Ok(loaded.app)
    }

    /// POST a form to an OAuth endpoint and return whatever the identity provider answered.
    ///
    /// Non-success statuses are returned, not raised, so the caller can relay OAuth
    /// error bodies. An empty body is returned as `null`.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<RelayedResponse, IdpError> {
        debug!("Forwarding form to {}", url);

        let response = self.client.post(url).form(form).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| IdpError::Malformed(format!("JSON parse error: {e}")))?
        };

        debug!("Identity provider answered {} for {}", status, url);
        Ok(RelayedResponse { status, body })
    }

    /// Fetch a JSON document, e.g. the published authorization server metadata
    pub async fn fetch_json(&self, url: &str) -> Result<Value, IdpError> {
        let response = self.client.get(url).send().await?;
        parse_json(ensure_success(response).await?).await
    }
}

async fn ensure_success(response: Response) -> Result<Response, IdpError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!("Identity provider API error {}: {}", status, body);
    Err(IdpError::Status { status, body })
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, IdpError> {
    response
        .json()
        .await
        .map_err(|e| IdpError::Malformed(format!("JSON parse error: {e}")))
}
