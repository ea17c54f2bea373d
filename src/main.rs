//! Signal streaming server.
//!
//! Initializes configuration and logging, builds the pipeline, starts the
//! capture source and serves WebSocket sessions until SIGINT/SIGTERM.

use anyhow::Context;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use signal_stream_server::{
    analysis::AnalyzerCatalog,
    capture,
    config::Config,
    pipeline::{Pipeline, Transport},
    reliability::{init_tracing, GracefulShutdown, PipelineMetrics, ShutdownGuard, TracingConfig},
    server::{create_router, AppState, ConnectionTable},
    types::OverflowPolicy,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;
    init_tracing(&TracingConfig::from(&config))?;

    let exporter = match PipelineMetrics::install() {
        Ok(exporter) => Some(exporter),
        Err(e) => {
            warn!(error = %e, "Continuing without Prometheus metrics");
            None
        }
    };

    let (pipeline, receiver) = Pipeline::new(&config).context("building pipeline")?;
    let pipeline = Arc::new(pipeline);
    let connections = Arc::new(ConnectionTable::new());

    let transport: Arc<dyn Transport> = connections.clone();
    let dispatch = tokio::spawn(pipeline.dispatch_loop(receiver, transport).run());

    let reporter_cancel = CancellationToken::new();
    let reporter = tokio::spawn(pipeline.reporter().run(reporter_cancel.clone()));

    let source = capture::from_config(&config).context("selecting capture source")?;
    info!(source = %source.describe(), "Starting capture");
    let capture = source
        .start(pipeline.bridge())
        .context("starting capture")?;

    let state = Arc::new(AppState::new(
        Arc::clone(&pipeline),
        AnalyzerCatalog::with_builtins(),
        connections,
        exporter,
    ));
    let app = create_router(state);

    let shutdown = GracefulShutdown::new();
    shutdown.listen_for_signals();
    let server_guard = ShutdownGuard::new("http_server", &shutdown);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Launch at http://{}", addr);
    if config.overflow_policy == OverflowPolicy::Skip {
        info!("Overflowed snapshots will be skipped");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(server_guard.wait_for_shutdown())
        .await
        .context("serving HTTP")?;

    capture.stop_async().await;
    reporter_cancel.cancel();
    pipeline.shutdown().await?;

    let summary = dispatch.await.context("joining dispatch loop")?;
    let _ = reporter.await;
    info!(
        rounds = summary.rounds,
        delivered = summary.delivered,
        failed = summary.failed,
        "Shutdown complete"
    );
    Ok(())
}
