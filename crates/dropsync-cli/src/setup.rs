//! Adapter wiring and process signal handling shared by `sync` and `watch`

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dropsync_core::config::Config;
use dropsync_dropbox::auth::DropboxAuth;
use dropsync_dropbox::client::DropboxClient;
use dropsync_dropbox::provider::DropboxSourceLister;
use dropsync_s3::store::{S3DestinationStore, S3Settings};
use dropsync_sync::engine::{Reconciler, ReconcilerOptions};

/// Fails with every validation problem when the config is unusable
pub fn ensure_valid(config: &Config) -> Result<()> {
    let errors = config.validate();
    if errors.is_empty() {
        return Ok(());
    }

    let details: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    anyhow::bail!("Invalid configuration: {}", details.join("; "))
}

/// Builds the reconciler with live Dropbox and S3 adapters
///
/// Exchanges the refresh token once up front, so bad credentials fail
/// before any pass starts.
pub async fn build_reconciler(config: &Config, dry_run: bool) -> Result<Reconciler> {
    let source = &config.source;
    let (app_key, app_secret, refresh_token) = match (
        source.app_key.as_deref(),
        source.app_secret.as_deref(),
        source.refresh_token.as_deref(),
    ) {
        (Some(key), Some(secret), Some(token)) => (key, secret, token),
        _ => anyhow::bail!("Dropbox app key, app secret and refresh token are required"),
    };

    let auth = DropboxAuth::new(app_key, app_secret)?;
    let token = auth
        .refresh_access_token(refresh_token)
        .await
        .context("Dropbox authentication failed")?;

    let mut client = DropboxClient::new(token.secret.clone());
    if let Some(namespace_id) = &source.root_namespace_id {
        client = client.with_root_namespace(namespace_id);
    }
    if let Some(member_id) = &source.member_id {
        client = client.with_member_id(member_id);
    }
    let lister = DropboxSourceLister::new(client).with_token_refresh(auth, refresh_token, token);

    let store = S3DestinationStore::connect(&S3Settings::from_config(&config.destination)).await;

    let options = ReconcilerOptions {
        dry_run,
        max_concurrency: config.sync.max_concurrency,
        ..ReconcilerOptions::default()
    };

    info!(
        source = %source.path,
        bucket = %config.destination.bucket,
        prefix = %config.key_prefix(),
        dry_run,
        "Adapters ready"
    );

    Ok(Reconciler::new(Arc::new(lister), Arc::new(store), options))
}

/// Cancels `token` on SIGINT or SIGTERM
pub async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

/// Spawns [`shutdown_signal`] and returns the token it cancels
pub fn cancel_on_signal() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });
    token
}
