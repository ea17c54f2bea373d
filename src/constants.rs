//! Domain constants for the signal-stream-server.
//!
//! Compile-time values only. Anything an operator may tune lives in
//! [`crate::config::Config`] instead.

/// Signal defaults used when no configuration overrides them.
pub mod signal {
    /// Default input sample rate in hertz.
    pub const DEFAULT_SAMPLE_RATE: f64 = 16000.0;

    /// Default number of input channels.
    pub const DEFAULT_CHANNELS: usize = 1;

    /// Default block size (frames per capture callback).
    pub const DEFAULT_TIME_STEP: usize = 2048;

    /// Default analysis window size in frames.
    pub const DEFAULT_WINDOW_SIZE: usize = 2048;

    /// Upper bound for any window resize.
    pub const MAX_WINDOW_SIZE: usize = 1 << 20;

    /// Upper bound for the channel count.
    pub const MAX_CHANNELS: usize = 64;
}

/// Hand-off queue and reporting constants.
pub mod pipeline {
    use std::time::Duration;

    /// Queue capacity under the `skip` overflow policy.
    pub const BOUNDED_QUEUE_CAPACITY: usize = 1;

    /// Default interval between queue-health reports.
    pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(2);
}

/// Wire protocol names and framing.
pub mod protocol {
    /// Outbound: client-facing property set.
    pub const EVENT_PROPERTIES: &str = "properties";

    /// Outbound: encoded analyzer output.
    pub const EVENT_RESULTS: &str = "results";

    /// Outbound: diagnostic text.
    pub const EVENT_INTERNAL_ERROR: &str = "internal_error";

    /// Leading bytes of every binary result frame.
    pub const RESULT_MAGIC: [u8; 4] = *b"SSA1";
}

/// Synthetic capture source parameters.
pub mod synthetic {
    /// Tone frequency of channel 0; channel `n` uses `(n + 1)` times this.
    pub const BASE_FREQUENCY_HZ: f64 = 440.0;

    /// Peak amplitude of generated tones.
    pub const AMPLITUDE: f32 = 0.5;

    /// Name of the real-time producer thread.
    pub const THREAD_NAME: &str = "capture-rt";
}

/// Configuration file locations, relative to the working directory.
pub mod files {
    pub const CONFIG_TOML: &str = "signal-stream.toml";
    pub const CONFIG_YAML: &str = "signal-stream.yaml";
    pub const ENV_PREFIX: &str = "SIGSTREAM_";
}
