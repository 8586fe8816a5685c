//! GenHub Gateway: HTTP API and page guard in front of the sled store.
//!
//! Maintenance commands (see `maintenance`) run instead of the server when
//! the first argument is one of them.

mod admin;
mod ai;
mod claim;
mod config;
mod error;
mod maintenance;
mod profile;
mod request;
mod routes;
mod session;
mod state;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use genhub_core::{Backend, FeatureGate, GeminiBridge, RouteGuard, SledBackend};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::GatewayConfig;
use crate::maintenance::{BoxError, Command};
use crate::state::AppState;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let config = match GatewayConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    let _log_guard = init_tracing(&config);

    if let Err(e) = run(config).await {
        tracing::error!("gateway stopped: {}", e);
        std::process::exit(1);
    }
}

/// Console logging, plus a daily rolling file when `log_dir` is set.
/// The returned guard must live as long as the process.
fn init_tracing(config: &GatewayConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let (file_layer, guard) = match config.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "genhub-gateway.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    guard
}

async fn run(config: GatewayConfig) -> Result<(), BoxError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;
    let store = Arc::new(SledBackend::open(Some(&config.storage_path))?);
    if let Some(command) = command {
        println!("{}", command.run(&store)?);
        return Ok(());
    }

    let overrides = store.feature_overrides()?;
    if !overrides.is_empty() {
        tracing::info!("feature overrides loaded from store");
    }
    if config.ai.api_key.is_none() {
        tracing::warn!("no generative API key configured; /api/generate-bio will fail");
    }
    let generator = GeminiBridge::new(config.ai.api_key.clone())
        .with_api_base(&config.ai.api_base)
        .with_model(&config.ai.model);

    let bind_addr = config.bind_addr();
    let fail_open = config.fail_open;
    let state = AppState {
        config: Arc::new(config),
        backend: store.clone(),
        identities: store,
        generator: Arc::new(generator),
        gate: Arc::new(FeatureGate::new(overrides)),
        guard: RouteGuard::new(fail_open),
    };
    let app = routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        addr = %bind_addr,
        fail_open,
        version = genhub_core::version(),
        "GenHub gateway listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
