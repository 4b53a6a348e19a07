//! Audio engine: owns the cpal output stream and routes the mixer to a
//! hardware or virtual device.

use crate::board::Cueboard;
use crate::config::{CueboardDesc, DEFAULT_DEVICE};
use crate::error::{CueboardError, DeviceError, Result};
use crate::events::EventHub;
use crate::mixer::{MixerContext, mix_block};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Owns the open output stream and the current device selection.
///
/// The engine and the [`Cueboard`] it was built from share one instance
/// table and one master volume, so everything the board registers is mixed
/// by whichever device stream is currently open. Streams are platform
/// handles and keep the engine bound to the thread that created it.
pub struct CueboardEngine {
    desc: CueboardDesc,
    ctx: MixerContext,
    events: Arc<EventHub>,
    stream: Option<cpal::Stream>,
    device_name: String,
    is_running: Arc<AtomicBool>,
}

impl CueboardEngine {
    /// Creates an engine wired to `board`'s instance table. No device is
    /// touched until [`start`](CueboardEngine::start).
    pub fn new(desc: CueboardDesc, board: &Cueboard) -> Self {
        Self {
            desc,
            ctx: board.mixer_context(),
            events: board.events_shared(),
            stream: None,
            device_name: DEFAULT_DEVICE.to_string(),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens the currently selected device and starts mixing.
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let stream = self.open_stream(&self.device_name)?;
        stream.play().map_err(|e| {
            CueboardError::Device(DeviceError::OpenFailed {
                device: self.device_name.clone(),
                detail: format!("failed to start stream: {e}"),
            })
        })?;

        self.stream = Some(stream);
        self.is_running.store(true, Ordering::Release);
        log::info!("Engine started on device {}", self.device_name);
        Ok(())
    }

    /// Closes the output stream. Instances stay registered and resume
    /// mixing on the next start.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            self.is_running.store(false, Ordering::Release);
            drop(stream);
            log::info!("Engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Name of the currently selected output device.
    pub fn current_device(&self) -> &str {
        &self.device_name
    }

    /// Switches output to `device_name`.
    ///
    /// The new stream is opened before the old one is dropped: when the open
    /// fails, the previous device keeps playing and the error is returned,
    /// never a half-open state. Active instances continue across the switch
    /// from their current cursors, since both streams mix the same shared
    /// table.
    pub fn set_device(&mut self, device_name: &str) -> Result<()> {
        if device_name == self.device_name {
            return Ok(());
        }

        if self.stream.is_some() {
            let stream = self.open_stream(device_name)?;
            stream.play().map_err(|e| {
                CueboardError::Device(DeviceError::OpenFailed {
                    device: device_name.to_string(),
                    detail: format!("failed to start stream: {e}"),
                })
            })?;
            // Old stream drops only after the replacement is live.
            self.stream = Some(stream);
        }

        self.device_name = device_name.to_string();
        log::info!("Output device switched to {}", self.device_name);
        Ok(())
    }

    /// Enumerates output devices, with the `"Default"` sentinel first.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| CueboardError::Device(DeviceError::Enumeration(e.to_string())))?;

        let mut names: Vec<String> = devices.filter_map(|d| d.name().ok()).collect();
        names.retain(|name| !is_alsa_plugin_alias(name));
        names.sort();
        names.dedup();
        names.insert(0, DEFAULT_DEVICE.to_string());
        Ok(names)
    }

    fn find_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device> {
        let device = if device_name == DEFAULT_DEVICE {
            host.default_output_device()
        } else {
            host.output_devices()
                .map_err(|e| CueboardError::Device(DeviceError::Enumeration(e.to_string())))?
                .find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
        };

        device.ok_or_else(|| {
            CueboardError::Device(DeviceError::NotFound(device_name.to_string()))
        })
    }

    fn open_stream(&self, device_name: &str) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = Self::find_device(&host, device_name)?;

        let open_failed = |detail: String| {
            CueboardError::Device(DeviceError::OpenFailed {
                device: device_name.to_string(),
                detail,
            })
        };

        let config = cpal::StreamConfig {
            channels: self.desc.channels,
            sample_rate: cpal::SampleRate(self.desc.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.desc.block_size as u32),
        };

        let default_config = device
            .default_output_config()
            .map_err(|e| open_failed(format!("failed to get default config: {e}")))?;

        match default_config.sample_format() {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(&device, &config, device_name),
            cpal::SampleFormat::I16 => self.build_stream::<i16>(&device, &config, device_name),
            cpal::SampleFormat::U16 => self.build_stream::<u16>(&device, &config, device_name),
            other => Err(open_failed(format!("unsupported sample format {other:?}"))),
        }
    }

    fn build_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        device_name: &str,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let ctx = self.ctx.clone();
        let is_running = Arc::clone(&self.is_running);
        let channels = self.desc.channels;
        // Pre-sized so the callback never allocates; grows only if the
        // device delivers a larger block than requested.
        let mut scratch = vec![0.0f32; self.desc.block_size * channels as usize];

        let events = Arc::clone(&self.events);
        let error_device = device_name.to_string();

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if !is_running.load(Ordering::Relaxed) {
                        for sample in data.iter_mut() {
                            *sample = T::from_sample(0.0f32);
                        }
                        return;
                    }

                    if scratch.len() < data.len() {
                        scratch.resize(data.len(), 0.0);
                    }
                    let block = &mut scratch[..data.len()];

                    mix_block(&ctx, block, channels);

                    for (out, sample) in data.iter_mut().zip(block.iter()) {
                        *out = T::from_sample(*sample);
                    }
                },
                move |err| {
                    // Disconnects land here; the engine object stays usable
                    // and the caller can pick another device.
                    events.emit_device_error(DeviceError::Stream {
                        device: error_device.clone(),
                        detail: err.to_string(),
                    });
                },
                None,
            )
            .map_err(|e| {
                CueboardError::Device(DeviceError::OpenFailed {
                    device: device_name.to_string(),
                    detail: format!("failed to build stream: {e}"),
                })
            })?;

        Ok(stream)
    }
}

impl Drop for CueboardEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// ALSA exposes every plugin alias as its own device; hide the ones that are
/// never useful targets for a soundboard.
fn is_alsa_plugin_alias(name: &str) -> bool {
    let n = name.to_lowercase();
    n.starts_with("hw:")
        || n.starts_with("plughw:")
        || n.starts_with("dmix:")
        || n.starts_with("dsnoop:")
        || n.ends_with("rate")
        || n.starts_with("speex")
        || n.contains("surround")
        || n.contains("upmix")
        || n.contains("vdownmix")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alsa_plugin_aliases_are_filtered() {
        assert!(is_alsa_plugin_alias("hw:CARD=PCH,DEV=0"));
        assert!(is_alsa_plugin_alias("plughw:CARD=PCH,DEV=0"));
        assert!(is_alsa_plugin_alias("dmix:CARD=PCH,DEV=0"));
        assert!(is_alsa_plugin_alias("surround51:CARD=PCH,DEV=0"));
        assert!(is_alsa_plugin_alias("samplerate"));

        assert!(!is_alsa_plugin_alias("pipewire"));
        assert!(!is_alsa_plugin_alias("pulse"));
        assert!(!is_alsa_plugin_alias("USB Audio Device"));
    }
}
