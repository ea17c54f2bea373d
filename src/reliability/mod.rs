//! Operational concerns: graceful shutdown, metrics export and logging.

pub mod graceful_shutdown;
pub mod metrics;
pub mod tracing;

pub use graceful_shutdown::{GracefulShutdown, ShutdownGuard};
pub use metrics::PipelineMetrics;
pub use self::tracing::{init_tracing, TracingConfig};
