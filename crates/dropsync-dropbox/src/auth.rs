//! OAuth2 refresh-token exchange for the Dropbox API
//!
//! dropsync runs unattended, so it never goes through the interactive
//! authorization flow. The user provisions a long-lived refresh token once
//! and each run exchanges it for a short-lived access token.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dropsync_dropbox::auth::DropboxAuth;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let auth = DropboxAuth::new("app-key", "app-secret")?;
//! let token = auth.refresh_access_token("refresh-token").await?;
//! println!("expires at {}", token.expires_at);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use oauth2::{
    basic::BasicClient, ClientId, ClientSecret, EndpointNotSet, EndpointSet, RefreshToken,
    TokenResponse, TokenUrl,
};
use tracing::{debug, info};

/// Dropbox OAuth2 token endpoint
const TOKEN_URL: &str = "https://api.dropbox.com/oauth2/token";

/// Lifetime assumed when the token response omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 4 * 60 * 60;

/// Short-lived access token obtained from a refresh token
#[derive(Clone)]
pub struct AccessToken {
    /// Bearer token for API requests
    pub secret: String,
    /// When the token stops being accepted
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the token expires within `margin` from now
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"********")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// OAuth2 client with only the token endpoint configured
type RefreshClient =
    BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Exchanges a refresh token for an access token using the app credentials
pub struct DropboxAuth {
    client: RefreshClient,
}

impl DropboxAuth {
    /// Creates a new DropboxAuth against the public token endpoint
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Result<Self> {
        Self::with_token_url(app_key, app_secret, TOKEN_URL)
    }

    /// Creates a new DropboxAuth with a custom token endpoint (useful for testing)
    pub fn with_token_url(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(app_key.into()))
            .set_client_secret(ClientSecret::new(app_secret.into()))
            .set_token_uri(TokenUrl::new(token_url.into()).context("Invalid token URL")?);

        Ok(Self { client })
    }

    /// Performs the refresh-token grant
    ///
    /// # Errors
    ///
    /// Fails when the endpoint is unreachable or rejects the credentials.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<AccessToken> {
        info!("Refreshing Dropbox access token");

        let http_client = reqwest::Client::new();
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&http_client)
            .await
            .context("Failed to refresh Dropbox access token")?;

        let lifetime = token_result
            .expires_in()
            .and_then(|d| i64::try_from(d.as_secs()).ok())
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);

        let token = AccessToken {
            secret: token_result.access_token().secret().to_string(),
            expires_at: Utc::now() + Duration::seconds(lifetime),
        };

        if token.secret.is_empty() {
            anyhow::bail!("Dropbox returned an empty access token");
        }

        debug!(expires_at = %token.expires_at, "Access token refreshed");
        Ok(token)
    }
}
