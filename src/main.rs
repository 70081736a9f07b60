//! Pharmacy Simulator: upload an encrypted prescription, see its medications.
//!
//! Main entry point for the web server.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pharmacy_simulator::adapters::sanitize::SanitizingMakeWriter;
use pharmacy_simulator::adapters::web::{routes, AppState};
use pharmacy_simulator::config::{AppConfig, SecretSource};

const DEFAULT_LOG_FILE: &str = "pharmacy-simulator.log";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stdout unless PHARMACY_LOG_MODE=file.
    let log_mode = std::env::var("PHARMACY_LOG_MODE").unwrap_or_else(|_| "stdout".to_string());

    let (writer, _guard) = if log_mode == "file" {
        let log_file = std::env::var("PHARMACY_LOG_FILE")
            .unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());

        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("opening log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting Pharmacy Simulator...");

    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::debug!("Configuration: {:?}", config);
    if config.secret_source == SecretSource::Generated {
        tracing::warn!(
            "No secret key configured; flash messages will not survive a restart. \
             Set PHARMACY_SECRET_KEY_FILE for deployments."
        );
    }

    let state = AppState::new(&config).context("building application state")?;

    let (addr, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(config.socket_addr(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
        })
        .with_context(|| format!("binding {}", config.socket_addr()))?;

    tracing::info!("Listening on http://{addr}");
    server.await;

    tracing::info!("Pharmacy Simulator shutdown complete.");
    Ok(())
}
