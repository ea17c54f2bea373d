//! Per-channel signal level.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::properties::{parse_value, Property, PropertyTable};
use crate::analysis::{AnalysisOutput, Analyzer};
use crate::error::{AnalysisError, ConfigError};
use crate::pipeline::Snapshot;

/// How a channel's level is measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelMode {
    /// Root mean square over the window.
    #[default]
    Rms,
    /// Largest absolute sample in the window.
    Peak,
}

impl LevelMode {
    fn as_str(self) -> &'static str {
        match self {
            LevelMode::Rms => "rms",
            LevelMode::Peak => "peak",
        }
    }
}

/// Emits one level value per channel, shape `[channels]`.
#[derive(Debug, Default)]
pub struct LevelMeter {
    mode: LevelMode,
}

static PROPERTIES: PropertyTable<LevelMeter> = PropertyTable::new(&[Property {
    name: "mode",
    get: |a| Value::from(a.mode.as_str()),
    set: |a, v| {
        a.mode = parse_value("mode", v)?;
        Ok(())
    },
}]);

impl Analyzer for LevelMeter {
    fn analyze(&mut self, snapshot: &Snapshot) -> Result<AnalysisOutput, AnalysisError> {
        let rows = snapshot.rows().max(1) as f32;
        let levels = (0..snapshot.channels())
            .map(|c| match self.mode {
                LevelMode::Rms => (snapshot.channel(c).map(|x| x * x).sum::<f32>() / rows).sqrt(),
                LevelMode::Peak => snapshot.channel(c).fold(0.0f32, |acc, x| acc.max(x.abs())),
            })
            .collect();
        Ok(AnalysisOutput::vector(levels))
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
