//! Name -> factory registry for analyzers.

use std::collections::BTreeMap;

use crate::analysis::{Analyzer, LevelMeter, Spectrum, SumAnalyzer, Waveform};
use crate::error::ConfigError;

/// Builds a fresh analyzer instance.
pub type AnalyzerFactory = fn() -> Box<dyn Analyzer>;

fn boxed<A: Analyzer + Default + 'static>() -> Box<dyn Analyzer> {
    Box::new(A::default())
}

/// Registry of analyzer factories, resolved once per session start.
#[derive(Clone)]
pub struct AnalyzerCatalog {
    factories: BTreeMap<&'static str, AnalyzerFactory>,
}

impl AnalyzerCatalog {
    /// A catalog with nothing registered.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// The catalog of analyzers shipped with the server.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::empty();
        catalog.register("level", boxed::<LevelMeter>);
        catalog.register("spectrum", boxed::<Spectrum>);
        catalog.register("sum", boxed::<SumAnalyzer>);
        catalog.register("waveform", boxed::<Waveform>);
        catalog
    }

    /// Add or replace a factory.
    pub fn register(&mut self, name: &'static str, factory: AnalyzerFactory) {
        self.factories.insert(name, factory);
    }

    /// Construct a new analyzer by name.
    pub fn create(&self, name: &str) -> Result<Box<dyn Analyzer>, ConfigError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ConfigError::UnknownAnalyzer(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for AnalyzerCatalog {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for AnalyzerCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyzerCatalog")
            .field("names", &self.names())
            .finish()
    }
}
