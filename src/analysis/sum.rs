//! Sum of every sample in the window. Mostly useful for diagnostics.

use serde_json::Value;

use crate::analysis::properties::PropertyTable;
use crate::analysis::{AnalysisOutput, Analyzer};
use crate::error::{AnalysisError, ConfigError};
use crate::pipeline::Snapshot;

#[derive(Debug, Default)]
pub struct SumAnalyzer;

static PROPERTIES: PropertyTable<SumAnalyzer> = PropertyTable::new(&[]);

impl Analyzer for SumAnalyzer {
    fn analyze(&mut self, snapshot: &Snapshot) -> Result<AnalysisOutput, AnalysisError> {
        Ok(AnalysisOutput::scalar(snapshot.as_slice().iter().sum()))
    }

    fn property_names(&self) -> Vec<&'static str> {
        PROPERTIES.names()
    }

    fn get_property(&self, name: &str) -> Result<Value, ConfigError> {
        PROPERTIES.get(self, name)
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), ConfigError> {
        PROPERTIES.set(self, name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sums_whole_window() {
        let snapshot = Snapshot::from_interleaved(vec![1.0, 2.0, 3.0, 4.0], 1).unwrap();
        let output = SumAnalyzer.analyze(&snapshot).unwrap();
        assert_eq!(output.data(), &[10.0]);
        assert!(SumAnalyzer.get_client_properties(None).unwrap().is_empty());
    }
}
