//! Error types for Cueboard

use crate::playback::InstanceId;
use thiserror::Error;

/// Decoding failures, scoped to the single play/preload request that
/// triggered them.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported audio format for {path}: {detail}")]
    UnsupportedFormat { path: String, detail: String },
}

/// Output device failures. Recoverable: the engine keeps its previous device
/// on a failed switch and stays usable after a disconnect.
#[derive(Error, Debug, Clone)]
pub enum DeviceError {
    #[error("Audio device not found: {0}")]
    NotFound(String),

    #[error("Failed to open audio device {device}: {detail}")]
    OpenFailed { device: String, detail: String },

    #[error("Failed to enumerate audio devices: {0}")]
    Enumeration(String),

    #[error("Audio stream error on {device}: {detail}")]
    Stream { device: String, detail: String },
}

/// A command referenced an instance that is no longer active. Benign: the
/// instance most likely finished on its own.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceError {
    #[error("Playback instance not found: {0}")]
    NotFound(InstanceId),
}

#[derive(Error, Debug)]
pub enum CueboardError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error("Invalid operation for current playback state: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine error: {0}")]
    Engine(String),
}

pub type Result<T> = std::result::Result<T, CueboardError>;
