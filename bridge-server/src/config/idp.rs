use serde::Deserialize;

/// Connection settings for the external identity provider
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdpConfig {
    /// Project (tenant) identifier at the identity provider - mandatory
    pub project_id: String,

    /// Management credential used for app registration calls - mandatory
    pub management_key: String,

    /// Identity provider base URL (default: https://api.descope.com)
    pub base_url: String,

    /// Timeout for a single identity provider call in seconds (default: 10)
    pub request_timeout: u64,

    /// Timeout for establishing a connection in seconds (default: 2)
    pub connect_timeout: u64,

    /// When set, `/.well-known/oauth-authorization-server` serves this document
    /// instead of the locally built metadata
    pub metadata_url: Option<String>,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            project_id: "".to_string(),
            management_key: "".to_string(),
            base_url: "https://api.descope.com".to_string(),
            request_timeout: 10,
            connect_timeout: 2,
            metadata_url: None,
        }
    }
}

impl IdpConfig {
    /// Returns a URL to the identity provider with the given path
    pub fn get_url<S: Into<String>>(&self, path: S) -> String {
        let path = path.into();
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        }
    }

    pub fn authorize_url(&self) -> String {
        self.get_url("/oauth2/v1/authorize")
    }

    pub fn token_url(&self) -> String {
        self.get_url("/oauth2/v1/token")
    }

    pub fn revoke_url(&self) -> String {
        self.get_url("/oauth2/v1/revoke")
    }

    /// Hosted login page the third-party apps send users to
    pub fn login_page_url(&self) -> String {
        self.get_url(format!("/login/{}?flow=sign-up-or-in", self.project_id))
    }
}
