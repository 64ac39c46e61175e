//! Wire models for the identity provider API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Successful session validation
#[derive(Debug, Clone, Deserialize)]
pub struct ValidatedSession {
    /// The (possibly refreshed) session JWT
    #[serde(default)]
    pub jwt: Option<String>,
    /// Claims of the session token
    #[serde(default)]
    pub token: Map<String, Value>,
}

/// Third-party application creation request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppRequest {
    pub name: String,
    pub approved_callback_urls: Vec<String>,
    pub login_page_url: String,
}

/// Third-party application creation response
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedApp {
    /// Application id, used to load the app afterwards
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadAppResponse {
    pub app: IdpApp,
}

/// Third-party application as stored by the identity provider
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdpApp {
    #[serde(default)]
    pub id: Option<String>,
    pub client_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub approved_callback_urls: Vec<String>,
}
