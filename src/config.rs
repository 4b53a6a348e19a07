use std::time::Duration;

/// Period of the telemetry thread that samples instance positions and mixed
/// output levels. Independent of the audio callback cadence.
pub const TELEMETRY_TICK: Duration = Duration::from_millis(150);

/// Tolerance window for seek reconciliation: a snapshot more than this far
/// below an armed seek target is considered stale and discarded.
pub const SEEK_TOLERANCE_MS: u64 = 100;

/// Device name sentinel that selects the host's default output device.
pub const DEFAULT_DEVICE: &str = "Default";

/// Configuration descriptor for a Cueboard engine
#[derive(Debug, Clone)]
pub struct CueboardDesc {
    /// Sample rate the mixer runs at; decoded clips are resampled to this
    /// rate when they enter the cache.
    pub sample_rate: u32,
    /// Number of output channels (typically 2 for stereo)
    pub channels: u16,
    /// Requested frames per audio callback
    pub block_size: usize,
    /// Period of the telemetry broadcaster thread
    pub telemetry_tick: Duration,
}

impl Default for CueboardDesc {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            block_size: 1024,
            telemetry_tick: TELEMETRY_TICK,
        }
    }
}
