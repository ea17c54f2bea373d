//! The `signal_stream_server` core library.
//!
//! A real-time signal-streaming pipeline: a capture thread feeds fixed-size
//! multi-channel blocks into a sliding window, snapshots of the window cross
//! into an async dispatch loop under a configurable overflow policy, and
//! every connected session runs its own analyzer over each snapshot and
//! receives its own result stream over a WebSocket.

pub mod analysis;
pub mod capture;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod pipeline;
pub mod reliability;
pub mod server;
pub mod types;
