//! # Cueboard
//!
//! Playback engine for a desktop soundboard: concurrently-playing clip
//! instances, real-time mixing to a selectable output device, live progress
//! telemetry and seek reconciliation.
//!
//! The crate is the engine only. Grid layout, paging, theming and settings
//! live in the embedding application and talk to the engine through the
//! command methods on [`Cueboard`]/[`CueboardEngine`] and the event
//! channels on [`EventHub`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use cueboard::*;
//! use std::path::Path;
//!
//! let desc = CueboardDesc::default();
//! let board = Cueboard::new(desc.clone())?;
//!
//! // Open the output device and start mixing.
//! let mut engine = CueboardEngine::new(desc, &board);
//! engine.start()?;
//!
//! // Trigger a clip; layered retriggers of the same button are fine.
//! let id = board.play("3", Path::new("sounds/boom.wav"), "Boom", 0.8)?;
//!
//! // Observe progress, filtering stale snapshots around seeks.
//! let progress = board.events().progress();
//! let mut tracker = ProgressTracker::new();
//!
//! tracker.note_seek(id, 5000);
//! board.seek(id, 5000)?;
//!
//! for snapshot in progress.try_iter() {
//!     if tracker.apply(&snapshot) {
//!         // update the UI from `snapshot`
//!     }
//! }
//!
//! board.stop_all();
//! # Ok::<(), CueboardError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`Cueboard`]**: instance manager — play/pause/seek/stop/volume
//!   commands, the decode cache and the event hub
//! - **[`CueboardEngine`]**: owns the cpal output stream and device routing
//! - **[`ProgressTracker`]**: observer-side seek reconciliation and
//!   position extrapolation
//! - **[`DecodeCache`](audio_data::DecodeCache)**: load-once cache of
//!   decoded clips
//! - **[`LibraryStore`]**: managed storage for imported sound files
//!
//! ## Architecture
//!
//! Three threads share the engine state:
//!
//! 1. **Control thread**: owns the [`Cueboard`], issues commands
//! 2. **Audio callback**: mixes all Playing instances into the device stream
//! 3. **Telemetry thread**: emits periodic snapshots and level samples
//!
//! Fields touched across thread boundaries (cursors, volumes, pause flags)
//! are atomics; the instance table is locked only for O(1) structural work,
//! and the callback `try_lock`s it so it can never block on the control
//! side.

pub mod audio_data;
pub mod board;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod library;
pub mod playback;
pub mod tracker;

mod mixer;
mod telemetry;

pub use audio_data::{AudioDataLoader, CueboardAudioData, DecodeCache, LoadOptions, SymphoniaLoader};
pub use board::Cueboard;
pub use config::{CueboardDesc, DEFAULT_DEVICE, SEEK_TOLERANCE_MS, TELEMETRY_TICK};
pub use engine::CueboardEngine;
pub use error::{CueboardError, DecodeError, DeviceError, InstanceError, Result};
pub use events::{EventHub, LevelSample, ProgressSnapshot};
pub use library::LibraryStore;
pub use playback::{InstanceId, PlayState, PlaybackInstance};
pub use tracker::ProgressTracker;
