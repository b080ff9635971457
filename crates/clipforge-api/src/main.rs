//! ClipForge API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipforge_api::{create_router, metrics, ApiConfig, AppState};
use clipforge_media::TrimOptions;
use clipforge_ml_client::{MlClient, MlClientConfig};
use clipforge_worker::{
    CacheSweeper, Dispatcher, FfmpegTrimmer, InMemoryJobStore, JobStore, MlClipDetector,
    MlTranscriber, StageAdapters, WorkerConfig,
};

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "clipforge=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

/// Build the production stage adapters. A missing FFmpeg is fatal; an
/// unreachable ML service is not, since it may come up later.
async fn build_adapters() -> anyhow::Result<StageAdapters> {
    let trimmer = FfmpegTrimmer::new(TrimOptions::default())?;

    let ml_config = MlClientConfig::from_env();
    let ml = Arc::new(MlClient::new(ml_config).context("failed to build ML client")?);
    if ml.health_check().await.unwrap_or(false) {
        info!("ML service reachable at {}", ml.base_url());
    } else {
        warn!(
            "ML service at {} is not healthy yet; jobs will fail at transcription until it is",
            ml.base_url()
        );
    }

    let mut transcriber = MlTranscriber::new(ml.clone());
    if let Ok(language) = std::env::var("TRANSCRIBE_LANGUAGE") {
        if !language.trim().is_empty() {
            transcriber = transcriber.with_language(language.trim());
        }
    }

    Ok(StageAdapters::new(
        Arc::new(transcriber),
        Arc::new(MlClipDetector::new(ml)),
        Arc::new(trimmer),
    ))
}

async fn run() -> anyhow::Result<()> {
    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    info!(
        "API config: host={}, port={}, environment={}",
        config.host, config.port, config.environment
    );
    info!(
        "Cache at {}, clips at {}",
        worker_config.cache_dir.display(),
        worker_config.output_dir.display()
    );

    let adapters = build_adapters().await?;
    let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
    let dispatcher = Arc::new(
        Dispatcher::from_config(&worker_config, store, adapters)
            .await
            .context("failed to initialize worker")?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = CacheSweeper::spawn(
        dispatcher.cache().clone(),
        worker_config.cache_max_age,
        worker_config.cache_sweep_interval,
        shutdown_rx,
    );

    let metrics_handle = if config.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                info!("Prometheus metrics enabled at /metrics");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install metrics recorder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let app = create_router(AppState::new(config.clone(), dispatcher.clone()), metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;
    if !dispatcher.shutdown().await {
        warn!("{} jobs abandoned at shutdown", dispatcher.running_jobs());
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();
    info!("Starting clipforge-api");

    if let Err(e) = run().await {
        error!("Fatal: {:#}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
