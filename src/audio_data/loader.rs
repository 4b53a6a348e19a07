use crate::audio_data::{CueboardAudioData, LoadOptions};
use crate::error::DecodeError;
use std::sync::Arc;

/// Trait for loading audio data from file paths.
///
/// Cueboard ships a Symphonia-based implementation ([`SymphoniaLoader`]),
/// but a custom loader can be plugged into the [`DecodeCache`] for
/// specialized formats or for tests.
///
/// [`SymphoniaLoader`]: crate::audio_data::SymphoniaLoader
/// [`DecodeCache`]: crate::audio_data::DecodeCache
pub trait AudioDataLoader: Send + Sync {
    /// Loads and fully decodes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Unreadable`] when the file cannot be read and
    /// [`DecodeError::UnsupportedFormat`] when the container or codec is not
    /// recognized. Both abort only this request.
    fn load(
        &self,
        path: &str,
        options: &LoadOptions,
    ) -> std::result::Result<Arc<CueboardAudioData>, DecodeError>;
}
