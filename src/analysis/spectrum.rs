//! Magnitude spectrum of one channel.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde_json::Value;
use std::f32::consts::PI;
use std::sync::Arc;

use crate::analysis::properties::{parse_value, Property, PropertyTable};
use crate::analysis::{AnalysisOutput, Analyzer};
use crate::error::{AnalysisError, ConfigError};
use crate::pipeline::Snapshot;

/// Floor applied before taking logarithms.
const MIN_MAGNITUDE: f32 = 1e-10;

/// Hann-windowed FFT magnitude of `channel`, shape `[window / 2 + 1]`.
///
/// Magnitudes are normalized by the window length; with `db` set they are
/// reported as `20 * log10(magnitude)`.
pub struct Spectrum {
    channel: usize,
    db: bool,
    plan: Option<Arc<dyn Fft<f32>>>,
    taper: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl Default for Spectrum {
    fn default() -> Self {
        Self {
            channel: 0,
            db: false,
            plan: None,
            taper: Vec::new(),
            buffer: Vec::new(),
        }
    }
}

impl std::fmt::Debug for Spectrum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spectrum")
            .field("channel", &self.channel)
            .field("db", &self.db)
            .field("len", &self.taper.len())
            .finish()
    }
}

static PROPERTIES: PropertyTable<Spectrum> = PropertyTable::new(&[
    Property {
        name: "channel",
        get: |a| Value::from(a.channel),
        set: |a, v| {
            a.channel = parse_value("channel", v)?;
            Ok(())
        },
    },
    Property {
        name: "db",
        get: |a| Value::from(a.db),
        set: |a, v| {
            a.db = parse_value("db", v)?;
            Ok(())
        },
    },
]);

impl Spectrum {
    /// Re-plan when the window length changes.
    fn prepare(&mut self, len: usize) -> Arc<dyn Fft<f32>> {
        match &self.plan {
            Some(plan) if plan.len() == len => Arc::clone(plan),
            _ => {
                let plan = FftPlanner::new().plan_fft_forward(len);
                self.taper = hann(len);
                self.plan = Some(Arc::clone(&plan));
                plan
            }
        }
    }
}

fn hann(len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f32;
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / denom).cos())
        .collect()
}

impl Analyzer for Spectrum {
    fn analyze(&mut self, snapshot: &Snapshot) -> Result<AnalysisOutput, AnalysisError> {
        if self.channel >= snapshot.channels() {
            return Err(AnalysisError::ChannelOutOfRange {
                channel: self.channel,
                channels: snapshot.channels(),
            });
        }

        let len = snapshot.rows();
        if len == 0 {
            return Ok(AnalysisOutput::vector(Vec::new()));
        }

        let plan = self.prepare(len);
        self.buffer.clear();
        self.buffer.extend(
            snapshot
                .channel(self.channel)
                .zip(&self.taper)
                .map(|(x, w)| Complex::new(x * w, 0.0)),
        );
        plan.process(&mut self.buffer);

        let scale = 1.0 / len as f32;
        let bins = self.buffer[..len / 2 + 1].iter().map(|c| c.norm() * scale);
        let magnitudes: Vec<f32> = if self.db {
            bins.map(|m| 20.0 * m.max(MIN_MAGNITUDE).log10()).collect()
        } else {
            bins.collect()
        };

        Ok(AnalysisOutput::vector(magnitudes))
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
    use serde_json::json;

    fn tone(len: usize, bin: usize) -> Snapshot {
        let data = (0..len)
            .map(|n| (2.0 * PI * bin as f32 * n as f32 / len as f32).sin())
            .collect();
        Snapshot::from_interleaved(data, 1).unwrap()
    }

    fn argmax(values: &[f32]) -> usize {
        values
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0
    }

    #[test]
    fn test_peak_at_tone_bin() {
        let mut spectrum = Spectrum::default();
        let output = spectrum.analyze(&tone(64, 8)).unwrap();
        assert_eq!(output.shape(), &[33]);
        assert_eq!(argmax(output.data()), 8);
    }

    #[test]
    fn test_replans_when_window_changes() {
        let mut spectrum = Spectrum::default();
        spectrum.analyze(&tone(64, 8)).unwrap();
        let output = spectrum.analyze(&tone(128, 20)).unwrap();
        assert_eq!(output.shape(), &[65]);
        assert_eq!(argmax(output.data()), 20);
    }

    #[test]
    fn test_db_scale_is_finite_for_silence() {
        let mut spectrum = Spectrum::default();
        spectrum.set_property("db", json!(true)).unwrap();
        let silence = Snapshot::from_interleaved(vec![0.0; 16], 1).unwrap();
        let output = spectrum.analyze(&silence).unwrap();
        assert!(output.data().iter().all(|v| v.is_finite() && *v <= -199.0));
    }

    #[test]
    fn test_out_of_range_channel_fails() {
        let mut spectrum = Spectrum::default();
        spectrum.set_property("channel", json!(2)).unwrap();
        let snapshot = Snapshot::from_interleaved(vec![0.0; 8], 2).unwrap();
        assert!(matches!(
            spectrum.analyze(&snapshot),
            Err(AnalysisError::ChannelOutOfRange {
                channel: 2,
                channels: 2
            })
        ));
    }
}
