//! Application state for dependency injection.
//!
//! This module provides the application state that is shared
//! between all request handlers.

use std::sync::Arc;

use crate::analysis::AnalyzerCatalog;
use crate::pipeline::Pipeline;
use crate::reliability::PipelineMetrics;
use crate::server::connections::ConnectionTable;
use crate::server::metrics::ServiceMetrics;
use crate::server::session::SessionService;

/// Shared application state containing dependencies.
#[derive(Clone)]
pub struct AppState {
    /// The streaming pipeline
    pub pipeline: Arc<Pipeline>,

    /// Analyzer factories, by name
    pub catalog: Arc<AnalyzerCatalog>,

    /// Open WebSocket connections
    pub connections: Arc<ConnectionTable>,

    /// Session event handling
    pub sessions: Arc<SessionService>,

    /// Service metrics
    pub metrics: Arc<ServiceMetrics>,

    /// Prometheus exporter, if one was installed
    pub exporter: Option<PipelineMetrics>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The connection table doubles as the pipeline's transport; the caller
    /// keeps its own handle to give to the dispatch loop.
    pub fn new(
        pipeline: Arc<Pipeline>,
        catalog: AnalyzerCatalog,
        connections: Arc<ConnectionTable>,
        exporter: Option<PipelineMetrics>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let sessions = Arc::new(SessionService::new(
            Arc::clone(pipeline.registry()),
            Arc::clone(&catalog),
            connections.clone(),
        ));

        Self {
            pipeline,
            catalog,
            connections,
            sessions,
            metrics: Arc::new(ServiceMetrics::new()),
            exporter,
        }
    }
}
