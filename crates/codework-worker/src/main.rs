//! Single-language code evaluation worker.
//!
//! Boots from a TOML config (fatal on any config error), exposes
//! `POST /execute` + `GET /health`, and reports every accepted batch to
//! the orchestrator callback exactly once.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod blobs;
mod callback;
mod config;
mod http;
mod service;

use callback::OrchestratorClient;
use config::WorkerConfig;
use cw_engine::BatchEvaluator;
use http::AppState;
use service::EvaluationService;

#[derive(Parser)]
#[command(
    name = "codework-worker",
    about = "Single-language code evaluation worker"
)]
struct Cli {
    /// Path to the worker configuration file.
    #[arg(long, default_value = "worker.toml")]
    config: PathBuf,

    /// Address the HTTP endpoint binds to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();

    // Config errors are fatal: better no worker than the wrong language.
    let config = WorkerConfig::load(&cli.config)?;
    let language = config.execution.language;

    std::fs::create_dir_all(&config.execution.working_directory).with_context(|| {
        format!(
            "failed to create working directory {}",
            config.execution.working_directory.display()
        )
    })?;

    let missing = cw_engine::language::missing_tools(language).await;
    if !missing.is_empty() {
        warn!(
            language = %language,
            ?missing,
            "toolchain binaries missing from PATH; evaluations will fail"
        );
    }

    let evaluator = BatchEvaluator::new(
        language,
        config.execution.working_directory.clone(),
        config.limits.as_global_limits(),
    );
    let service = Arc::new(EvaluationService::new(
        evaluator,
        blobs::from_config(&config.storage),
        OrchestratorClient::new(&config.orchestrator),
    ));
    let state = Arc::new(AppState {
        service,
        language,
        api_header_name: config.orchestrator.api_header_name.clone(),
        api_key: config.orchestrator.api_key.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("failed to bind HTTP endpoint at {}", cli.listen))?;
    info!(
        addr = %listener.local_addr().context("failed to resolve local address")?,
        language = %language,
        "worker listening"
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server stopped with error")?;

    Ok(())
}
