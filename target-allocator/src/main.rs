use std::sync::Arc;

use allocation::Allocator;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use target_allocator::config::Config;
use target_allocator::discovery::FileDiscovery;
use target_allocator::error::Result;
use target_allocator::metrics::setup_metrics_routes;
use target_allocator::server::{router, AppState, ScrapeConfigStore};

async fn shutdown_signal(cancel: CancellationToken) {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    tracing::info!("Shutting down gracefully...");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::init_with_defaults()?;

    let log_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(log_layer)
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let allocator = Arc::new(Allocator::new(&config.allocation_strategy)?);
    let scrape_configs = Arc::new(ScrapeConfigStore::new());

    tracing::info!("Starting target-allocator");
    tracing::info!("Allocation strategy: {}", allocator.strategy_name());
    tracing::info!("Discovery file: {}", config.discovery_file);
    tracing::info!("Discovery interval: {:?}", config.discovery_interval());

    let cancel = CancellationToken::new();

    let discovery = FileDiscovery::new(&config.discovery_file, config.static_collectors());
    let discovery_handle = tokio::spawn(discovery.run(
        Arc::clone(&allocator),
        Arc::clone(&scrape_configs),
        config.discovery_interval(),
        cancel.child_token(),
    ));

    let app = setup_metrics_routes(router(AppState::new(allocator, scrape_configs)))?;

    let bind = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!("Listening on {}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    if let Err(e) = discovery_handle.await {
        tracing::error!("discovery task failed: {e}");
    }

    Ok(())
}
