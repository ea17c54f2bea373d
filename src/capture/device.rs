//! Default input device through cpal.
//!
//! cpal streams are not `Send` on every host, so the stream is built, played
//! and dropped on its own thread. The device callback runs on cpal's
//! real-time thread and calls straight into the bridge.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{error, info};

use super::{CaptureHandle, CaptureSource};
use crate::config::Config;
use crate::constants::synthetic::THREAD_NAME;
use crate::error::CaptureError;
use crate::pipeline::CaptureBridge;

/// How often the owner thread checks the stop flag.
const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct DeviceSource {
    sample_rate: u32,
    channels: u16,
    time_step: u32,
}

impl DeviceSource {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sample_rate: config.sample_rate.round() as u32,
            channels: config.channels as u16,
            time_step: config.default_time_step as u32,
        }
    }

    fn open(&self, bridge: CaptureBridge) -> Result<cpal::Stream, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::Device("no default input device".to_string()))?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let stream_config = StreamConfig {
            channels: self.channels,
            sample_rate: SampleRate(self.sample_rate),
            buffer_size: BufferSize::Fixed(self.time_step),
        };

        let status_bridge = bridge.clone();
        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    bridge.process_block(data);
                },
                move |err| status_bridge.report_status(&err.to_string()),
                None,
            )
            .map_err(|e| CaptureError::Device(format!("failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| CaptureError::Device(format!("failed to start stream: {}", e)))?;

        info!(device = %name, sample_rate = self.sample_rate, channels = self.channels, "Device capture started");
        Ok(stream)
    }
}

impl CaptureSource for DeviceSource {
    fn start(self: Box<Self>, bridge: CaptureBridge) -> Result<CaptureHandle, CaptureError> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || {
                let stream = match self.open(bridge) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while flag.load(Ordering::Acquire) {
                    thread::park_timeout(STOP_POLL);
                }
                drop(stream);
            })?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::Device("capture thread exited".to_string())));
        let handle = CaptureHandle::new(running, thread);
        if let Err(e) = ready {
            error!(error = %e, "Device capture failed to start");
            handle.stop();
            return Err(e);
        }
        Ok(handle)
    }

    fn describe(&self) -> String {
        format!("device {}ch @ {} Hz", self.channels, self.sample_rate)
    }
}
