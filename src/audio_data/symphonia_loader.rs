use crate::audio_data::{AudioDataLoader, CueboardAudioData, LoadOptions};
use crate::error::DecodeError;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Default audio loader backed by the Symphonia decoder library.
///
/// Decodes WAV, MP3, FLAC, OGG and whatever else the enabled Symphonia
/// codecs cover into interleaved f32 PCM, optionally resampling to the
/// engine sample rate.
pub struct SymphoniaLoader;

fn unsupported(path: &str, detail: impl std::fmt::Display) -> DecodeError {
    DecodeError::UnsupportedFormat {
        path: path.to_string(),
        detail: detail.to_string(),
    }
}

impl AudioDataLoader for SymphoniaLoader {
    fn load(
        &self,
        path: &str,
        options: &LoadOptions,
    ) -> std::result::Result<Arc<CueboardAudioData>, DecodeError> {
        let file = File::open(path).map_err(|e| DecodeError::Unreadable {
            path: path.to_string(),
            source: e,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| unsupported(path, format!("failed to probe container: {e:?}")))?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| unsupported(path, "no default audio track"))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| unsupported(path, "sample rate not found"))?;

        let channels = track
            .codec_params
            .channels
            .ok_or_else(|| unsupported(path, "channel count not found"))?
            .count() as u16;

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| unsupported(path, format!("failed to create decoder: {e:?}")))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            // Read the next packet from the container
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(_)) => break, // end-of-file
                Err(e) => {
                    return Err(unsupported(path, format!("error reading packet: {e:?}")));
                }
            };

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::IoError(_)) => break, // also EOF in some formats
                Err(Error::DecodeError(_)) => continue, // recoverable corruption
                Err(e) => {
                    return Err(unsupported(path, format!("error decoding packet: {e:?}")));
                }
            };

            // Always convert to interleaved f32
            let spec = *decoded.spec();
            let capacity = decoded.capacity();
            let mut tmp = SampleBuffer::<f32>::new(capacity as u64, spec);
            tmp.copy_interleaved_ref(decoded);

            samples.extend_from_slice(tmp.samples());
        }

        let duration = Duration::from_secs_f64(
            samples.len() as f64 / (sample_rate * channels as u32) as f64,
        );

        let mut audio_data = CueboardAudioData::new(samples, sample_rate, channels, duration);

        if let Some(target_rate) = options.target_sample_rate {
            if target_rate != sample_rate {
                audio_data = audio_data
                    .resample(target_rate)
                    .map_err(|e| unsupported(path, format!("resampling failed: {e}")))?;
            }
        }

        Ok(Arc::new(audio_data))
    }
}
