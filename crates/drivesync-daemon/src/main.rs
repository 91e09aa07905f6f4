//! drivesync Daemon - Queue worker service
//!
//! This binary consumes work items from the message queue and handles:
//! - OneDrive account authorization (store and validate refresh tokens)
//! - Copying stored objects into OneDrive
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Startup builds every adapter from the configuration and hands the
//! handler registry to a [`Dispatcher`]. The dispatcher runs until a
//! `CancellationToken` is triggered on receipt of SIGTERM or SIGINT, then
//! gives in-flight handlers the configured grace period.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use drivesync_aws::{sdk::StaticCredentials, S3ObjectStorage, SqsMessageQueue};
use drivesync_cache::{DatabasePool, SqliteCredentialStore};
use drivesync_core::{
    config::{Config, LoggingConfig, ValidationError},
    ports::ICredentialStore,
    registry::HandlerRegistry,
    usecases::{AuthorizeAccountUseCase, SyncFileUseCase},
};
use drivesync_dispatch::{DispatchSettings, Dispatcher};
use drivesync_graph::{
    auth::{OAuthClient, OAuthTokenSource},
    client::GraphClient,
    upload::GraphDriveUploader,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Command line
// ============================================================================

/// drivesync queue worker
#[derive(Debug, Parser)]
#[command(name = "drivesyncd", version, about = "Syncs queued files into OneDrive")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

// ============================================================================
// Configuration
// ============================================================================

/// Loads the configuration file, then applies environment overrides
///
/// An explicitly given file must exist; the default location is optional.
fn load_config(explicit: Option<&PathBuf>) -> Result<Config> {
    let mut config = match explicit {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };
    config.apply_env_overrides();
    Ok(config)
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `RUST_LOG` wins over the configured level
fn env_filter(logging: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(logging))
        .with_target(true);

    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Daemon service
// ============================================================================

/// Wired-up worker: adapters, handler registry and dispatcher
struct DaemonService {
    db_pool: DatabasePool,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the database and builds every adapter from `config`
    async fn new(config: &Config, shutdown: CancellationToken) -> Result<Self> {
        let db_pool = DatabasePool::new(&config.database.path)
            .await
            .context("Failed to open database")?;
        info!(path = %config.database.path.display(), "Database opened");

        let credential_store: Arc<dyn ICredentialStore> =
            Arc::new(SqliteCredentialStore::new(db_pool.pool().clone()));

        let oauth = OAuthClient::from_config(&config.auth).context("Failed to build OAuth client")?;
        let token_source = Arc::new(
            OAuthTokenSource::new(oauth, Arc::clone(&credential_store))
                .with_cache(config.auth.cache_access_tokens),
        );

        let graph = Arc::new(
            GraphClient::from_config(&config.drive, token_source.clone())
                .context("Failed to build Graph client")?,
        );
        let uploader = Arc::new(GraphDriveUploader::new(graph));

        let storage = Arc::new(S3ObjectStorage::from_config(&config.storage).await);
        let queue_credentials = StaticCredentials::from_parts(
            config.storage.access_key_id.as_deref(),
            config.storage.secret_access_key.as_deref(),
        );
        let queue = Arc::new(
            SqsMessageQueue::from_config(&config.queue, queue_credentials.as_ref()).await,
        );

        let authorize = Arc::new(AuthorizeAccountUseCase::new(
            Arc::clone(&credential_store),
            token_source,
        ));
        let sync = Arc::new(
            SyncFileUseCase::new(credential_store, storage, uploader)
                .with_batch_concurrency(config.drive.batch_concurrency),
        );
        let registry = Arc::new(HandlerRegistry::new(authorize, sync));

        let settings = DispatchSettings::from_config(&config.dispatch, &config.queue);
        let dispatcher = Dispatcher::new(queue, registry, settings);

        Ok(Self {
            db_pool,
            dispatcher,
            shutdown,
        })
    }

    /// Runs the dispatcher until shutdown, then closes the database
    async fn run(self) -> Result<()> {
        let result = self.dispatcher.run(self.shutdown.clone()).await;
        self.db_pool.close().await;
        result.context("Dispatcher terminated abnormally")
    }
}

// ============================================================================
// Signal handling
// ============================================================================

/// Waits for SIGINT or SIGTERM and cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    let errors = config.validate();
    if !errors.is_empty() {
        anyhow::bail!(
            "Invalid configuration:\n{}",
            format_validation_errors(&errors)
        );
    }
    if cli.check_config {
        println!("Configuration is valid");
        return Ok(());
    }

    init_tracing(&config.logging);
    info!(environment = %config.environment, "drivesync daemon starting (drivesyncd)");

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(&config, shutdown_token).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("drivesync daemon shut down gracefully"),
        Err(e) => error!(error = %format!("{e:#}"), "drivesync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
