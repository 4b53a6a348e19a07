//! Decoded audio data and loading functionality

mod cache;
mod loader;
mod resampler;
mod symphonia_loader;

pub use cache::DecodeCache;
pub use loader::AudioDataLoader;
pub use resampler::AudioResampler;
pub use symphonia_loader::SymphoniaLoader;

use std::sync::Arc;
use std::time::Duration;

/// Options controlling how an audio file is decoded.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Target sample rate for resampling (None = keep original)
    pub target_sample_rate: Option<u32>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_sample_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = Some(rate);
        self
    }
}

/// Container for one decoded clip with reference-counted sharing.
///
/// Samples are stored in interleaved format (`[L0, R0, L1, R1, ...]` for
/// stereo). The container is immutable after construction; every playback
/// instance of the same file shares one `Arc` of it.
#[derive(Debug, Clone)]
pub struct CueboardAudioData {
    inner: Arc<AudioDataInner>,
}

#[derive(Debug)]
pub(crate) struct AudioDataInner {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: Duration,
    pub total_frames: usize,
}

impl CueboardAudioData {
    pub(crate) fn new(
        samples: Vec<f32>,
        sample_rate: u32,
        channels: u16,
        duration: Duration,
    ) -> Self {
        let total_frames = samples.len() / channels as usize;
        Self {
            inner: Arc::new(AudioDataInner {
                samples,
                sample_rate,
                channels,
                duration,
                total_frames,
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    /// Clip duration in whole milliseconds, as reported in progress snapshots.
    pub fn duration_ms(&self) -> u64 {
        self.inner.duration.as_millis() as u64
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.samples.len()
    }

    /// Resample to a different sample rate, returning a new container.
    pub fn resample(&self, target_sample_rate: u32) -> crate::error::Result<Self> {
        if target_sample_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }

        let resampler = AudioResampler::new(
            self.inner.sample_rate,
            target_sample_rate,
            self.inner.channels,
            None,
        )?;

        let resampled = resampler.resample_interleaved(&self.inner.samples)?;

        let new_duration = Duration::from_secs_f64(
            resampled.len() as f64 / (target_sample_rate * self.inner.channels as u32) as f64,
        );

        Ok(Self::new(
            resampled,
            target_sample_rate,
            self.inner.channels,
            new_duration,
        ))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::CueboardAudioData;
    use std::sync::Arc;
    use std::time::Duration;

    /// Builds a mono clip of `frames` frames at `sample_rate`, filled with a
    /// constant amplitude. Enough for mixer and board tests; no files needed.
    pub(crate) fn constant_clip(
        frames: usize,
        sample_rate: u32,
        amplitude: f32,
    ) -> Arc<CueboardAudioData> {
        let samples = vec![amplitude; frames];
        let duration = Duration::from_secs_f64(frames as f64 / sample_rate as f64);
        Arc::new(CueboardAudioData::new(samples, sample_rate, 1, duration))
    }
}
