use crate::audio_data::{AudioDataLoader, CueboardAudioData, LoadOptions, SymphoniaLoader};
use crate::error::DecodeError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Load-once cache of decoded clips, keyed by path.
///
/// Entries are decoded and resampled to the engine sample rate the first time
/// a path is requested; every later request for the same path returns the
/// cached `Arc` without touching the file. Eviction is explicit via
/// [`clear`](DecodeCache::clear) only.
///
/// Loads happen under the cache lock, so a path is decoded at most once even
/// when `play` and `preload` race for it.
pub struct DecodeCache {
    target_sample_rate: u32,
    loader: Box<dyn AudioDataLoader>,
    entries: Mutex<HashMap<PathBuf, Arc<CueboardAudioData>>>,
}

impl DecodeCache {
    /// Creates a cache backed by the default Symphonia loader.
    pub fn new(target_sample_rate: u32) -> Self {
        Self::with_loader(target_sample_rate, Box::new(SymphoniaLoader))
    }

    /// Creates a cache backed by a custom loader.
    pub fn with_loader(target_sample_rate: u32, loader: Box<dyn AudioDataLoader>) -> Self {
        Self {
            target_sample_rate,
            loader,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached entry for `path`, loading it first if needed.
    pub fn get_or_load(
        &self,
        path: &Path,
    ) -> std::result::Result<Arc<CueboardAudioData>, DecodeError> {
        let mut entries = self.entries.lock().unwrap();

        if let Some(entry) = entries.get(path) {
            return Ok(Arc::clone(entry));
        }

        let options = LoadOptions::new().target_sample_rate(self.target_sample_rate);
        let data = self.loader.load(&path.to_string_lossy(), &options)?;

        log::debug!(
            "Decoded {}: {} frames, {} ch, {} ms",
            path.display(),
            data.total_frames(),
            data.channels(),
            data.duration_ms()
        );

        entries.insert(path.to_path_buf(), Arc::clone(&data));
        Ok(data)
    }

    /// Warms the cache for `path` without creating a playback instance.
    /// Idempotent: succeeds immediately when the path is already cached.
    pub fn preload(&self, path: &Path) -> std::result::Result<(), DecodeError> {
        self.get_or_load(path).map(drop)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.lock().unwrap().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Evicts every cached entry. Instances already playing keep their clip
    /// alive through their own `Arc`.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}
