//! Token verification, client registrations and the OAuth provider abstraction

pub mod clients;
pub mod provider;

use crate::idp::{IdpClient, IdpError};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

/// Claims that are lifted into dedicated [`AuthInfo`] fields and never repeated in `claims`
const RESERVED_CLAIMS: [&str; 4] = ["sub", "exp", "iss", "scopes"];

/// Identity of an authenticated caller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthInfo {
    #[serde(skip)]
    pub token: String,
    pub subject_id: String,
    pub scopes: BTreeSet<String>,
    /// Seconds since the Unix epoch
    pub expires_at: i64,
    pub claims: Map<String, Value>,
}

impl AuthInfo {
    /// Builds an `AuthInfo` from the claims returned by the identity provider.
    ///
    /// Fails when the claims carry no subject or no expiry, or when the token is already
    /// expired at `now` (seconds since the epoch).
    pub fn from_claims(
        token: String,
        mut claims: Map<String, Value>,
        now: i64,
    ) -> Result<Self, VerifyError> {
        let subject_id = match claims.get("sub").and_then(Value::as_str) {
            Some(sub) if !sub.is_empty() => sub.to_string(),
            _ => return Err(VerifyError::MissingSubject),
        };

        let expires_at = claims
            .get("exp")
            .and_then(|exp| exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64)))
            .ok_or(VerifyError::MissingExpiry)?;
        if expires_at <= now {
            return Err(VerifyError::Expired(expires_at));
        }

        let scopes = scopes_from_claims(&claims);
        for key in RESERVED_CLAIMS {
            claims.remove(key);
        }

        Ok(Self {
            token,
            subject_id,
            scopes,
            expires_at,
            claims,
        })
    }
}

/// Reads scopes from the `scopes` array claim, falling back to the space separated `scope` claim
fn scopes_from_claims(claims: &Map<String, Value>) -> BTreeSet<String> {
    if let Some(Value::Array(scopes)) = claims.get("scopes") {
        return scopes
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    match claims.get("scope").and_then(Value::as_str) {
        Some(scope) => scope.split_whitespace().map(str::to_string).collect(),
        None => BTreeSet::new(),
    }
}

/// Reasons a bearer token is not accepted. All of them are surfaced as 401.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Token rejected by the identity provider: {0}")]
    Rejected(#[from] IdpError),
    #[error("Token has no subject")]
    MissingSubject,
    #[error("Token has no expiry")]
    MissingExpiry,
    #[error("Token expired at {0}")]
    Expired(i64),
}

/// Verifies raw bearer tokens
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthInfo, VerifyError>;
}

/// Verifies tokens by validating them against the identity provider on every call
#[derive(Clone)]
pub struct IdpTokenVerifier {
    client: IdpClient,
}

impl IdpTokenVerifier {
    pub fn new(client: IdpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TokenVerifier for IdpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthInfo, VerifyError> {
        let session = self.client.validate_session(token).await.map_err(|e| {
            warn!("Session validation failed: {}", e);
            VerifyError::from(e)
        })?;
        let token = session.jwt.unwrap_or_else(|| token.to_string());
        let info = AuthInfo::from_claims(token, session.token, Utc::now().timestamp())?;
        debug!("Verified token for subject {}", info.subject_id);
        Ok(info)
    }
}
