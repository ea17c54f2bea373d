//! Pluggable per-session analyzers.
//!
//! An analyzer turns a window [`Snapshot`] into an [`AnalysisOutput`] and
//! exposes named client-facing properties. Analyzers are constructed by
//! name through the [`AnalyzerCatalog`], one instance per session, and their
//! state is only touched while the owning session's lock is held.

mod catalog;
mod level;
mod output;
pub mod properties;
mod spectrum;
mod sum;
mod waveform;

use serde_json::Value;

use crate::error::{AnalysisError, ConfigError};
use crate::pipeline::Snapshot;

pub use catalog::{AnalyzerCatalog, AnalyzerFactory};
pub use level::{LevelMeter, LevelMode};
pub use output::AnalysisOutput;
pub use properties::{apply_updates, PropertyMap};
pub use spectrum::Spectrum;
pub use sum::SumAnalyzer;
pub use waveform::Waveform;

/// Capability set every analyzer provides.
///
/// Implementations must not block on I/O: `analyze` runs with the session
/// lock held inside the dispatch loop.
pub trait Analyzer: Send {
    /// Produce a result from one snapshot.
    fn analyze(&mut self, snapshot: &Snapshot) -> Result<AnalysisOutput, AnalysisError>;

    /// Public property names in declaration order.
    fn property_names(&self) -> Vec<&'static str>;

    fn get_property(&self, name: &str) -> Result<Value, ConfigError>;

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), ConfigError>;

    /// Current values of all properties, or of the named subset.
    fn get_client_properties(&self, names: Option<&[String]>) -> Result<PropertyMap, ConfigError> {
        match names {
            None => self
                .property_names()
                .into_iter()
                .map(|name| Ok((name.to_string(), self.get_property(name)?)))
                .collect(),
            Some(names) => names
                .iter()
                .map(|name| Ok((name.clone(), self.get_property(name)?)))
                .collect(),
        }
    }
}
