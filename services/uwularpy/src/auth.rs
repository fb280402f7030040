//! GitHub App Authentication
//!
//! Authenticates as the App with an RS256 JWT and exchanges it for a
//! short-lived installation token, one per webhook delivery.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::github::client::{check, with_github_headers};
use crate::github::{GitHubApi, GitHubError, RestClient};

/// JWT claims for GitHub App authentication
#[derive(Debug, Serialize)]
pub struct GitHubAppClaims {
    /// Issued at time (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issuer (GitHub App ID)
    pub iss: String,
}

impl GitHubAppClaims {
    pub fn new(app_id: &str, now: u64) -> Self {
        Self {
            iat: now.saturating_sub(60), // 60 seconds ago to account for clock skew
            exp: now + 600,              // Expires in 10 minutes
            iss: app_id.to_string(),
        }
    }
}

/// Response from the installation token endpoint
#[derive(Debug, Deserialize)]
struct InstallationToken {
    token: String,
    expires_at: String,
}

/// Produces API clients scoped to a single installation
#[async_trait]
pub trait InstallationClients: Send + Sync {
    async fn client_for(&self, installation_id: u64) -> Result<Arc<dyn GitHubApi>, GitHubError>;
}

/// Real GitHub App credentials
pub struct AppInstallations {
    http: Client,
    api_url: String,
    app_id: String,
    key: EncodingKey,
}

impl AppInstallations {
    /// # Errors
    /// Returns [`GitHubError::Auth`] if the key is not an RSA PEM key.
    pub fn new(
        http: Client,
        api_url: impl Into<String>,
        app_id: impl Into<String>,
        private_key_pem: &[u8],
    ) -> Result<Self, GitHubError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem)
            .map_err(|e| GitHubError::Auth(format!("Failed to parse private key: {e}")))?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            key,
        })
    }

    /// Generate a JWT for GitHub App authentication, valid for 10 minutes
    pub fn generate_jwt(&self) -> Result<String, GitHubError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| GitHubError::Auth(format!("Failed to get current time: {e}")))?
            .as_secs();

        encode(
            &Header::new(Algorithm::RS256),
            &GitHubAppClaims::new(&self.app_id, now),
            &self.key,
        )
        .map_err(|e| GitHubError::Auth(format!("Failed to encode JWT: {e}")))
    }

    /// Exchange the App JWT for an installation access token
    async fn installation_token(&self, installation_id: u64) -> Result<String, GitHubError> {
        let jwt = self.generate_jwt()?;
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation_id
        );

        let response = with_github_headers(self.http.post(url))
            .bearer_auth(jwt)
            .send()
            .await?;
        let token: InstallationToken = check(response).await?.json().await?;

        debug!(installation = installation_id, expires_at = %token.expires_at, "Obtained installation token");
        Ok(token.token)
    }
}

#[async_trait]
impl InstallationClients for AppInstallations {
    async fn client_for(&self, installation_id: u64) -> Result<Arc<dyn GitHubApi>, GitHubError> {
        let token = self.installation_token(installation_id).await?;
        Ok(Arc::new(RestClient::new(
            self.http.clone(),
            self.api_url.clone(),
            token,
        )))
    }
}
