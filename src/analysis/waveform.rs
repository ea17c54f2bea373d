//! Decimated copy of the raw window, for plotting.

use serde_json::Value;

use crate::analysis::properties::{parse_value, Property, PropertyTable};
use crate::analysis::{AnalysisOutput, Analyzer};
use crate::error::{AnalysisError, ConfigError};
use crate::pipeline::Snapshot;

/// Keeps every `decimation`-th frame, always including the newest one.
/// Output shape is `[frames, channels]`.
#[derive(Debug)]
pub struct Waveform {
    decimation: usize,
}

impl Default for Waveform {
    fn default() -> Self {
        Self { decimation: 1 }
    }
}

static PROPERTIES: PropertyTable<Waveform> = PropertyTable::new(&[Property {
    name: "decimation",
    get: |a| Value::from(a.decimation),
    set: |a, v| {
        let decimation: usize = parse_value("decimation", v)?;
        if decimation == 0 {
            return Err(ConfigError::invalid_value("decimation", "must be at least 1"));
        }
        a.decimation = decimation;
        Ok(())
    },
}]);

impl Analyzer for Waveform {
    fn analyze(&mut self, snapshot: &Snapshot) -> Result<AnalysisOutput, AnalysisError> {
        let rows = snapshot.rows();
        let channels = snapshot.channels();
        if rows == 0 {
            return AnalysisOutput::matrix(0, channels, Vec::new())
                .map_err(|e| AnalysisError::Failed(e.to_string()));
        }

        let first = (rows - 1) % self.decimation;
        let mut data = Vec::with_capacity((rows / self.decimation + 1) * channels);
        let mut frames = 0;
        for row in (first..rows).step_by(self.decimation) {
            data.extend_from_slice(snapshot.row(row));
            frames += 1;
        }

        AnalysisOutput::matrix(frames, channels, data)
            .map_err(|e| AnalysisError::Failed(e.to_string()))
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
