//! Bucket Gateway - HTTP gateway in front of an S3-compatible object store
//!
//! Exposes a small JSON API to list buckets, read objects and upload objects
//! from multipart forms. Credentials and region come from the AWS default
//! provider chain; `S3_BUCKET_ENDPOINT` points the client at any
//! S3-compatible service.

mod config;
mod errors;
mod logger;
mod metrics;
mod routes;
mod server;
mod storage;

use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::logger::{fields, FieldValue, Logger, LoggerFactory};
use crate::routes::AppState;
use crate::server::Server;
use crate::storage::S3Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment and optional config file
    let config = Config::from_env().context("Failed to load configuration")?;

    // Process logs as JSON; RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_filter_directive())),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    metrics::register_metrics().context("Failed to register metrics")?;
    info!(?config, "Configuration loaded");

    let loggers = LoggerFactory::new(config.logging.logger_type, config.logging.level);
    let log = loggers.base();
    log.debug(
        "Request logger ready",
        fields! { "logger_type" => FieldValue::debug(&loggers.kind()) },
    );

    let storage = S3Storage::connect(&config.storage).await;
    let state = AppState::new(Arc::new(storage), loggers, config.server.max_form_memory);
    let server = Server::new(config.server.clone(), state);

    log.info(
        "Starting server",
        fields! { "address" => FieldValue::display(&config.server.bind_address) },
    );

    if let Err(err) = server.start(shutdown_signal(log.clone())).await {
        log.fatal(
            "Server failed",
            fields! { "error" => FieldValue::Error(format!("{:#}", err)) },
        );
        std::process::exit(1);
    }

    log.info("Server gracefully stopped.", fields! {});
    Ok(())
}

async fn shutdown_signal(log: Arc<dyn Logger>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    log.info("Received shutdown signal", fields! {});
}
