//! Fire Sender - submits the `fire()` call with multi-RPC failover
//!
//! Probes the configured endpoints, submits through the first one that accepts
//! the transaction, retries in rounds, and waits for the receipt.

use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

mod chain;
mod config;
mod error;
mod keystore;
mod tx;

use chain::{Confirmation, HttpRpcClient};
use config::Settings;
use keystore::{FileKeyStore, KeyStore};
use tx::{FireOutcome, TransactionSender};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    init_logging();

    info!("Starting Fire Sender v{}", env!("CARGO_PKG_VERSION"));

    // Prompts and the key check run before signal handlers are installed
    let sender = match prepare() {
        Ok(sender) => sender,
        Err(e) => {
            error!("Fire sender setup failed: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = sender.send_fire_transaction() => match result {
            Ok(outcome) => {
                report(&outcome);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Fire transaction failed: {:#}", e);
                ExitCode::FAILURE
            }
        },
        _ = shutdown_signal() => {
            // Anything already broadcast stays broadcast
            info!("Shutdown signal received, exiting");
            ExitCode::SUCCESS
        }
    }
}

/// Load configuration and unlock the key before any network I/O
fn prepare() -> Result<TransactionSender> {
    // Load configuration
    let settings = Settings::load()?;
    let fire_config = settings.engine_config()?;
    info!(
        "Loaded configuration with {} endpoints (test mode: {})",
        fire_config.endpoints.len(),
        fire_config.test_mode
    );

    let key_store = open_key_store(&settings)?;

    let rpc = Arc::new(HttpRpcClient::new(settings.rpc_timeout())?);
    Ok(TransactionSender::new(rpc, key_store, fire_config))
}

/// Open the keystore, running first-time setup when none exists
fn open_key_store(settings: &Settings) -> Result<Arc<dyn KeyStore>> {
    let path = &settings.keystore.path;
    let interactive = std::io::stdin().is_terminal();

    if !path.is_file() {
        if !interactive {
            anyhow::bail!("No keystore at {:?}; run interactively once to create it", path);
        }
        let store = keystore::prompt::run_first_time_setup(path)?;
        return Ok(Arc::new(store));
    }

    let password = match std::env::var(&settings.keystore.password_env) {
        Ok(password) => Zeroizing::new(password),
        Err(_) if interactive => keystore::prompt::read_secret("Keystore password: ")?,
        Err(_) => anyhow::bail!(
            "Keystore password not provided; set {}",
            settings.keystore.password_env
        ),
    };

    // A wrong password fails here, before any network I/O
    let store = FileKeyStore::new(path, password);
    store
        .decrypt_key()
        .with_context(|| format!("Cannot unlock keystore at {:?}", path))?;

    Ok(Arc::new(store))
}

fn report(outcome: &FireOutcome) {
    if outcome.is_dry_run() {
        info!(
            "Test mode run complete via {}; sentinel hash {:?}",
            outcome.endpoint, outcome.tx_hash
        );
        return;
    }

    match outcome.confirmation {
        Some(Confirmation::Confirmed(ref receipt)) => info!(
            "Fire transaction {:?} confirmed in block {} ({})",
            outcome.tx_hash, receipt.block_number, receipt.status
        ),
        _ => info!(
            "Fire transaction {:?} submitted via {} in round {}",
            outcome.tx_hash, outcome.endpoint, outcome.round
        ),
    }

    if let Some(warning) = outcome.warning() {
        warn!("{}", warning);
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,fire_sender=debug,hyper=warn,reqwest=warn")
    });

    let json = std::env::var("FIRE_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
