//! The control surface: creates and commands playback instances.

use crate::audio_data::{AudioDataLoader, DecodeCache, SymphoniaLoader};
use crate::config::CueboardDesc;
use crate::error::{InstanceError, Result};
use crate::events::{EventHub, ProgressSnapshot};
use crate::mixer::{LevelAccumulator, MixerContext};
use crate::playback::{InstanceId, PlaybackInstance};
use crate::telemetry::{TelemetryBroadcaster, snapshot};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Instance manager and command surface of the engine.
///
/// `Cueboard` owns the decode cache and the authoritative table of active
/// instances. Commands mutate instances through atomics or O(1) table
/// operations, so nothing here can stall the audio callback. The telemetry
/// broadcaster is spawned on construction and joined on drop.
///
/// # Architecture
///
/// - **Control thread(s)**: own the `Cueboard`, issue play/pause/seek/stop
/// - **Audio callback**: mixes the shared table via [`CueboardEngine`](crate::CueboardEngine)
/// - **Telemetry thread**: samples the same table and emits snapshots
pub struct Cueboard {
    desc: CueboardDesc,
    cache: DecodeCache,
    instances: Arc<Mutex<HashMap<InstanceId, Arc<PlaybackInstance>>>>,
    next_instance_id: AtomicU64,
    /// Master volume, f32 bits in 0.0..=1.0
    master_volume: Arc<AtomicU32>,
    levels: Arc<LevelAccumulator>,
    events: Arc<EventHub>,
    _telemetry: TelemetryBroadcaster,
}

impl Cueboard {
    /// Creates a board with the default Symphonia decoder.
    pub fn new(desc: CueboardDesc) -> Result<Self> {
        Self::with_loader(desc, Box::new(SymphoniaLoader))
    }

    /// Creates a board with a custom decode loader.
    pub fn with_loader(desc: CueboardDesc, loader: Box<dyn AudioDataLoader>) -> Result<Self> {
        let cache = DecodeCache::with_loader(desc.sample_rate, loader);
        let instances = Arc::new(Mutex::new(HashMap::new()));
        let levels = Arc::new(LevelAccumulator::new());
        let events = Arc::new(EventHub::new());

        let telemetry = TelemetryBroadcaster::spawn(
            Arc::clone(&instances),
            Arc::clone(&levels),
            Arc::clone(&events),
            desc.telemetry_tick,
        )?;

        Ok(Self {
            desc,
            cache,
            instances,
            next_instance_id: AtomicU64::new(1),
            master_volume: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            levels,
            events,
            _telemetry: telemetry,
        })
    }

    pub fn desc(&self) -> &CueboardDesc {
        &self.desc
    }

    /// Event surface for observers (progress, finished, levels, device
    /// errors).
    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Warms the decode cache without creating an instance. Idempotent.
    pub fn preload(&self, path: &Path) -> Result<()> {
        self.cache.preload(path)?;
        Ok(())
    }

    /// Evicts all cached clips. Playing instances keep theirs alive.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Starts a new playback of `path`, layered on top of whatever else is
    /// playing (including other instances of the same `source_key`).
    /// Returns the new instance's process-unique id.
    pub fn play(
        &self,
        source_key: &str,
        path: &Path,
        display_name: &str,
        volume: f32,
    ) -> Result<InstanceId> {
        let data = self.cache.get_or_load(path)?;

        let id = InstanceId(self.next_instance_id.fetch_add(1, Ordering::AcqRel));
        let instance = Arc::new(PlaybackInstance::new(
            id,
            source_key,
            display_name,
            data,
            volume,
        ));

        self.instances.lock().unwrap().insert(id, instance);
        log::debug!(
            "Instance {} playing {} (source {})",
            id,
            path.display(),
            source_key
        );
        Ok(id)
    }

    /// Flips Playing/Paused; returns the resulting paused flag.
    pub fn toggle_pause(&self, id: InstanceId) -> Result<bool> {
        Ok(self.instance(id)?.toggle_pause())
    }

    /// Pauses an instance. Idempotent; returns the resulting paused flag.
    pub fn pause(&self, id: InstanceId) -> Result<bool> {
        Ok(self.instance(id)?.pause())
    }

    /// Resumes an instance. Idempotent; returns the resulting paused flag.
    pub fn resume(&self, id: InstanceId) -> Result<bool> {
        Ok(self.instance(id)?.resume())
    }

    /// Moves an instance's cursor, clamped to `[0, duration_ms]`. Valid
    /// while Playing or Paused; the mixer reads the new position on the
    /// next block it processes.
    pub fn seek(&self, id: InstanceId, position_ms: u64) -> Result<()> {
        self.instance(id)?.seek_ms(position_ms);
        Ok(())
    }

    pub fn set_instance_volume(&self, id: InstanceId, volume: f32) -> Result<()> {
        self.instance(id)?.set_volume(volume);
        Ok(())
    }

    pub fn instance_volume(&self, id: InstanceId) -> Result<f32> {
        Ok(self.instance(id)?.volume())
    }

    /// Master volume applied to the summed mix; takes effect on the next
    /// mixed block. Individual instance volumes are untouched.
    pub fn set_master_volume(&self, volume: f32) {
        self.master_volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Acquire))
    }

    /// Removes an instance from the active set. Caller-initiated and
    /// terminal: no `finished` event is emitted for it. Unknown ids report
    /// [`InstanceError::NotFound`], a benign outcome when the instance
    /// already finished on its own.
    pub fn stop(&self, id: InstanceId) -> Result<()> {
        match self.instances.lock().unwrap().remove(&id) {
            Some(_) => {
                log::debug!("Instance {} stopped", id);
                Ok(())
            }
            None => Err(InstanceError::NotFound(id).into()),
        }
    }

    /// Removes every active instance. Always succeeds.
    pub fn stop_all(&self) {
        let mut instances = self.instances.lock().unwrap();
        let count = instances.len();
        instances.clear();
        if count > 0 {
            log::debug!("Stopped {} active instances", count);
        }
    }

    /// Ids of all active instances, ascending (creation order).
    pub fn active_instances(&self) -> Vec<InstanceId> {
        let mut ids: Vec<InstanceId> = self.instances.lock().unwrap().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn instance_count(&self) -> usize {
        self.instances.lock().unwrap().len()
    }

    pub fn is_active(&self, id: InstanceId) -> bool {
        self.instances.lock().unwrap().contains_key(&id)
    }

    /// On-demand snapshot of one instance, same shape the telemetry feed
    /// emits.
    pub fn progress_of(&self, id: InstanceId) -> Result<ProgressSnapshot> {
        Ok(snapshot(&*self.instance(id)?))
    }

    fn instance(&self, id: InstanceId) -> Result<Arc<PlaybackInstance>> {
        self.instances
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| InstanceError::NotFound(id).into())
    }

    pub(crate) fn mixer_context(&self) -> MixerContext {
        MixerContext {
            instances: Arc::clone(&self.instances),
            master_volume: Arc::clone(&self.master_volume),
            levels: Arc::clone(&self.levels),
            events: Arc::clone(&self.events),
        }
    }

    pub(crate) fn events_shared(&self) -> Arc<EventHub> {
        Arc::clone(&self.events)
    }
}
