//! Web server and API implementation.
//!
//! This module provides the HTTP and WebSocket server functionality
//! for the signal-stream service.

mod connections;
mod handlers;
mod metrics;
pub mod protocol;
mod session;
mod state;
mod stream;

pub use connections::{ConnectionHandle, ConnectionTable};
pub use handlers::{create_router, health_check, metrics_handler};
pub use metrics::ServiceMetrics;
pub use protocol::ClientEvent;
pub use session::SessionService;
pub use state::AppState;
pub use stream::serve_socket;
