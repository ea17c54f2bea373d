//! Block producers that feed the [`CaptureBridge`].
//!
//! A source owns a dedicated real-time thread and calls
//! [`CaptureBridge::process_block`] once per block. Dropping the returned
//! [`CaptureHandle`] stops the thread and waits for it.

#[cfg(feature = "device")]
mod device;
mod synthetic;

#[cfg(feature = "device")]
pub use device::DeviceSource;
pub use synthetic::SyntheticSource;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

use crate::config::{CaptureKind, Config};
use crate::error::CaptureError;
use crate::pipeline::CaptureBridge;

/// Something that can start producing blocks.
pub trait CaptureSource: Send {
    /// Spawn the producer thread.
    fn start(self: Box<Self>, bridge: CaptureBridge) -> Result<CaptureHandle, CaptureError>;

    /// Short label for logs.
    fn describe(&self) -> String;
}

/// Running producer. Stops on [`CaptureHandle::stop`] or drop.
#[derive(Debug)]
pub struct CaptureHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    pub(crate) fn new(running: Arc<AtomicBool>, thread: JoinHandle<()>) -> Self {
        Self {
            running,
            thread: Some(thread),
        }
    }

    /// Signal the thread and join it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// [`stop`](Self::stop) on the blocking pool, for async callers.
    pub async fn stop_async(self) {
        if tokio::task::spawn_blocking(move || self.stop()).await.is_err() {
            warn!("Capture stop task panicked");
        }
    }

    fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Capture thread panicked");
            } else {
                debug!("Capture thread joined");
            }
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Build the source selected by the configuration.
pub fn from_config(config: &Config) -> Result<Box<dyn CaptureSource>, CaptureError> {
    match config.capture_source {
        CaptureKind::Synthetic => Ok(Box::new(SyntheticSource::from_config(config))),
        #[cfg(feature = "device")]
        CaptureKind::Device => Ok(Box::new(DeviceSource::from_config(config))),
        #[cfg(not(feature = "device"))]
        CaptureKind::Device => Err(CaptureError::Unsupported(
            "built without the `device` feature".to_string(),
        )),
    }
}
