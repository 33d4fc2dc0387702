//! DropboxSourceLister - ISourceLister implementation for the Dropbox API
//!
//! Wraps the [`DropboxClient`] and delegates to the listing and download
//! modules to fulfil the [`ISourceLister`] port contract.
//!
//! ## Design Notes
//!
//! - The client is built with an access token that is already valid.
//! - With [`DropboxSourceLister::with_token_refresh`], the lister exchanges
//!   the refresh token again whenever the current access token is close to
//!   expiry. Long-running `watch` sessions outlive a single access token.
//! - Adapter errors are converted to `anyhow::Error` at the port boundary.

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

use dropsync_core::domain::{SourceItem, SourceRoot};
use dropsync_core::ports::{ContentStream, ISourceLister};

use crate::auth::{AccessToken, DropboxAuth};
use crate::client::DropboxClient;
use crate::{download, listing};

/// Refresh this long before the access token actually expires
const REFRESH_MARGIN_SECS: i64 = 5 * 60;

struct TokenRefresher {
    auth: DropboxAuth,
    refresh_token: String,
    current: Mutex<AccessToken>,
}

/// Dropbox implementation of [`ISourceLister`]
pub struct DropboxSourceLister {
    client: DropboxClient,
    refresher: Option<TokenRefresher>,
}

impl DropboxSourceLister {
    pub fn new(client: DropboxClient) -> Self {
        Self {
            client,
            refresher: None,
        }
    }

    /// Keeps the client's access token fresh using `refresh_token`
    ///
    /// `current` is the token the client was built with.
    pub fn with_token_refresh(
        mut self,
        auth: DropboxAuth,
        refresh_token: impl Into<String>,
        current: AccessToken,
    ) -> Self {
        self.refresher = Some(TokenRefresher {
            auth,
            refresh_token: refresh_token.into(),
            current: Mutex::new(current),
        });
        self
    }

    pub fn client(&self) -> &DropboxClient {
        &self.client
    }

    async fn ensure_fresh_token(&self) -> Result<()> {
        let Some(refresher) = &self.refresher else {
            return Ok(());
        };

        let mut current = refresher.current.lock().await;
        if !current.expires_within(chrono::Duration::seconds(REFRESH_MARGIN_SECS)) {
            return Ok(());
        }

        info!(expires_at = %current.expires_at, "Access token near expiry, refreshing");
        let token = refresher
            .auth
            .refresh_access_token(&refresher.refresh_token)
            .await
            .context("Failed to renew Dropbox access token")?;
        self.client.set_access_token(token.secret.clone());
        *current = token;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ISourceLister for DropboxSourceLister {
    async fn list_all(&self, root: &SourceRoot) -> Result<Vec<SourceItem>> {
        debug!(root = %root, "DropboxSourceLister::list_all");
        self.ensure_fresh_token().await?;
        Ok(listing::list_all(&self.client, root).await?)
    }

    async fn download(&self, absolute_path: &str) -> Result<ContentStream> {
        debug!(path = absolute_path, "DropboxSourceLister::download");
        self.ensure_fresh_token().await?;
        Ok(download::download(&self.client, absolute_path).await?)
    }
}
