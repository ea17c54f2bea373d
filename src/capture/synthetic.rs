//! Hardware-free block producer: phase-continuous sine tones.

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

use super::{CaptureHandle, CaptureSource};
use crate::config::Config;
use crate::constants::synthetic::{AMPLITUDE, BASE_FREQUENCY_HZ, THREAD_NAME};
use crate::error::CaptureError;
use crate::pipeline::CaptureBridge;

/// Emits `time_step` frames every `time_step / sample_rate` seconds.
/// Channel `n` carries a tone at `(n + 1) * 440 Hz`.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    sample_rate: f64,
    channels: usize,
    time_step: usize,
    phase: Vec<f64>,
}

impl SyntheticSource {
    pub fn new(sample_rate: f64, channels: usize, time_step: usize) -> Self {
        Self {
            sample_rate,
            channels,
            time_step,
            phase: vec![0.0; channels],
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.sample_rate, config.channels, config.default_time_step)
    }

    fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.time_step as f64 / self.sample_rate)
    }

    /// Produce the next interleaved block, advancing each channel's phase.
    pub fn next_block(&mut self) -> Vec<f32> {
        let mut block = vec![0.0f32; self.time_step * self.channels];
        for (channel, phase) in self.phase.iter_mut().enumerate() {
            let step = TAU * BASE_FREQUENCY_HZ * (channel + 1) as f64 / self.sample_rate;
            for frame in 0..self.time_step {
                block[frame * self.channels + channel] = AMPLITUDE * phase.sin() as f32;
                *phase = (*phase + step) % TAU;
            }
        }
        block
    }
}

impl CaptureSource for SyntheticSource {
    fn start(mut self: Box<Self>, bridge: CaptureBridge) -> Result<CaptureHandle, CaptureError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let period = self.block_duration();

        info!(
            sample_rate = self.sample_rate,
            channels = self.channels,
            time_step = self.time_step,
            "Starting synthetic capture"
        );

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let mut deadline = Instant::now();
                while flag.load(Ordering::Acquire) {
                    let block = self.next_block();
                    bridge.process_block(&block);

                    deadline += period;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else {
                        bridge.report_status("input overflow");
                        deadline = now;
                    }
                }
            })?;

        Ok(CaptureHandle::new(running, thread))
    }

    fn describe(&self) -> String {
        format!("synthetic {}ch @ {} Hz", self.channels, self.sample_rate)
    }
}
