//! The streaming core: window cache, hand-off queue, session registry,
//! dispatch loop and queue-health reporter.
//!
//! ```text
//! capture thread ──► CaptureBridge ──► WindowCache (merge + snapshot)
//!                         │
//!                         ▼ hand-off queue (skip | unbounded)
//!                    DispatchLoop ──► SessionRegistry ──► Analyzer ──► Transport
//! ```

mod bridge;
mod dispatch;
mod queue;
mod registry;
mod reporter;
mod transport;
mod window;

#[cfg(test)]
pub(crate) use transport::recording;

pub use bridge::CaptureBridge;
pub use dispatch::{DispatchLoop, DispatchSummary, RoundOutcome};
pub use queue::{handoff, Admission, HandoffReceiver, HandoffSender, PipelineItem, QueueInfo, QueueStats};
pub use registry::{SessionRegistry, SessionSlot};
pub use reporter::MetricsReporter;
pub use transport::{Outbound, Transport};
pub use window::{Snapshot, WindowCache};

use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::analysis::properties::parse_value;
use crate::analysis::PropertyMap;
use crate::config::Config;
use crate::error::{ConfigError, Result};

/// Pipeline-level properties, in reporting order. Only `window_size` is
/// writable.
pub const PIPELINE_PROPERTIES: &[&str] = &[
    "window_size",
    "sample_rate",
    "channels",
    "time_step",
    "overflow_policy",
];

/// Shared pipeline state, wired from the startup configuration.
#[derive(Debug)]
pub struct Pipeline {
    config: Config,
    cache: Arc<WindowCache>,
    registry: Arc<SessionRegistry>,
    info: Arc<QueueInfo>,
    sender: HandoffSender,
}

impl Pipeline {
    /// Build the pipeline. The returned receiver feeds the dispatch loop.
    pub fn new(config: &Config) -> std::result::Result<(Self, HandoffReceiver), ConfigError> {
        config.validate()?;

        let cache = Arc::new(WindowCache::new(config.default_window_size, config.channels)?);
        let info = Arc::new(QueueInfo::new());
        let (sender, receiver) = handoff(config.overflow_policy, Arc::clone(&info));

        info!(
            window_size = config.default_window_size,
            channels = config.channels,
            overflow_policy = %config.overflow_policy,
            "Pipeline initialized"
        );

        let pipeline = Self {
            config: config.clone(),
            cache,
            registry: Arc::new(SessionRegistry::new()),
            info,
            sender,
        };
        Ok((pipeline, receiver))
    }

    /// A bridge for the capture thread.
    pub fn bridge(&self) -> CaptureBridge {
        CaptureBridge::new(Arc::clone(&self.cache), self.sender.clone())
    }

    pub fn dispatch_loop(
        &self,
        receiver: HandoffReceiver,
        transport: Arc<dyn Transport>,
    ) -> DispatchLoop {
        DispatchLoop::new(
            receiver,
            Arc::clone(&self.registry),
            transport,
            Arc::clone(&self.info),
        )
    }

    pub fn reporter(&self) -> MetricsReporter {
        MetricsReporter::new(Arc::clone(&self.info), self.config.report_interval)
    }

    /// Enqueue the sentinel that terminates the dispatch loop.
    pub async fn shutdown(&self) -> Result<()> {
        self.sender.shutdown().await
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<WindowCache> {
        &self.cache
    }

    pub fn queue_info(&self) -> &Arc<QueueInfo> {
        &self.info
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn get_property(&self, name: &str) -> std::result::Result<Value, ConfigError> {
        let value = match name {
            "window_size" => Value::from(self.cache.window_size()),
            "sample_rate" => Value::from(self.config.sample_rate),
            "channels" => Value::from(self.config.channels),
            "time_step" => Value::from(self.config.default_time_step),
            "overflow_policy" => Value::from(self.config.overflow_policy.as_str()),
            _ => return Err(ConfigError::UnknownProperty(name.to_string())),
        };
        Ok(value)
    }

    /// Write one pipeline property. Everything but `window_size` is fixed
    /// for the process lifetime.
    pub fn set_property(&self, name: &str, value: Value) -> std::result::Result<(), ConfigError> {
        let write = self.check_property(name, value)?;
        self.commit(write)
    }

    fn check_property(&self, name: &str, value: Value) -> std::result::Result<PipelineWrite, ConfigError> {
        match name {
            "window_size" => {
                let size: usize = parse_value(name, value)?;
                window::validate_window_size(size)?;
                Ok(PipelineWrite::WindowSize(size))
            }
            _ if PIPELINE_PROPERTIES.contains(&name) => {
                Err(ConfigError::ReadOnlyProperty(name.to_string()))
            }
            _ => Err(ConfigError::UnknownProperty(name.to_string())),
        }
    }

    fn commit(&self, write: PipelineWrite) -> std::result::Result<(), ConfigError> {
        match write {
            PipelineWrite::WindowSize(size) => {
                self.cache.resize(size)?;
                info!(window_size = size, "Window resized");
            }
        }
        Ok(())
    }

    /// Current values of all pipeline properties, or of the named subset.
    pub fn client_properties(
        &self,
        names: Option<&[String]>,
    ) -> std::result::Result<PropertyMap, ConfigError> {
        match names {
            None => PIPELINE_PROPERTIES
                .iter()
                .map(|name| Ok((name.to_string(), self.get_property(name)?)))
                .collect(),
            Some(names) => names
                .iter()
                .map(|name| Ok((name.clone(), self.get_property(name)?)))
                .collect(),
        }
    }

    /// Apply a batch of updates, skipping nulls.
    ///
    /// Every entry is checked before anything is written, so a batch with
    /// one bad entry changes nothing. Returns the names written, in order.
    pub fn apply_properties(&self, updates: &PropertyMap) -> std::result::Result<Vec<String>, ConfigError> {
        let mut writes = Vec::with_capacity(updates.len());
        for (name, value) in updates {
            if value.is_null() {
                continue;
            }
            writes.push((name.clone(), self.check_property(name, value.clone())?));
        }

        let mut applied = Vec::with_capacity(writes.len());
        for (name, write) in writes {
            self.commit(write)?;
            applied.push(name);
        }
        Ok(applied)
    }
}

/// A validated pipeline property write.
enum PipelineWrite {
    WindowSize(usize),
}
