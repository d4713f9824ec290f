mod email;
mod error;
mod model;
mod prompt;
mod rate_limiters;
mod request_tracing;
mod routes;
mod server_config;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{extract::FromRef, Router};
use email::processor::EmailProcessor;
use mimalloc::MiMalloc;
use prompt::SharedAnalyzer;
use rate_limiters::RateLimiters;
use routes::AppRouter;
use server_config::ServerConfig;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

pub type HttpClient = reqwest::Client;

#[derive(Clone, FromRef)]
struct ServerState {
    config: Arc<ServerConfig>,
    processor: EmailProcessor,
    analyzer: SharedAnalyzer,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let config = ServerConfig::load()?;
    println!("{}", config);

    // The client timeout backs up the analyzer's own deadline
    let http_client = reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .timeout(Duration::from_secs(config.ai.timeout_secs))
        .build()?;
    let rate_limiters = RateLimiters::new(&config.ai.prompt_limits);
    let analyzer = prompt::select_analyzer(&config, http_client, rate_limiters);
    let processor = EmailProcessor::new(&config, analyzer.clone());

    let state = ServerState {
        config: Arc::new(config),
        processor,
        analyzer,
    };

    let router = AppRouter::create(state.clone());
    run_server(router, &state.config).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {:?}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {:?}", e);
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
    tracing::info!("Shutdown signal received, draining connections");
}

async fn run_server(router: Router, config: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server host or port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Could not bind {addr}"))?;
    tracing::info!("Email triage server running on http://{}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server shut down, exiting");
    Ok(())
}
