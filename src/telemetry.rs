//! Periodic telemetry: samples every active instance and the mixed output
//! level on a fixed tick, independent of the audio callback's cadence.

use crate::events::{EventHub, ProgressSnapshot};
use crate::mixer::LevelAccumulator;
use crate::playback::{InstanceId, PlaybackInstance};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Builds the observable snapshot for one instance. `sync_time` marks the
/// wall-clock moment the position was authoritative.
pub(crate) fn snapshot(instance: &PlaybackInstance) -> ProgressSnapshot {
    ProgressSnapshot {
        source_key: instance.source_key().to_string(),
        instance_id: instance.id(),
        display_name: instance.display_name().to_string(),
        position_ms: instance.position_ms(),
        duration_ms: instance.duration_ms(),
        is_paused: instance.is_paused(),
        sync_time: Instant::now(),
    }
}

/// Background thread emitting one [`ProgressSnapshot`] per active instance
/// and one level sample per tick.
pub(crate) struct TelemetryBroadcaster {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TelemetryBroadcaster {
    pub(crate) fn spawn(
        instances: Arc<Mutex<HashMap<InstanceId, Arc<PlaybackInstance>>>>,
        levels: Arc<LevelAccumulator>,
        events: Arc<EventHub>,
        tick: Duration,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("cueboard-telemetry".to_string())
            .spawn(move || {
                log::debug!("Telemetry thread started, tick {} ms", tick.as_millis());
                while !stop_flag.load(Ordering::Acquire) {
                    std::thread::sleep(tick);
                    if stop_flag.load(Ordering::Acquire) {
                        break;
                    }

                    // Clone the Arcs out so the table lock is held O(n) only.
                    let active: Vec<Arc<PlaybackInstance>> =
                        instances.lock().unwrap().values().cloned().collect();

                    for instance in &active {
                        events.emit_progress(snapshot(instance));
                    }
                    events.emit_level(levels.take());
                }
                log::debug!("Telemetry thread stopped");
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub(crate) fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TelemetryBroadcaster {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_data::test_support::constant_clip;

    #[test]
    fn broadcasts_snapshots_and_levels() {
        let instances = Arc::new(Mutex::new(HashMap::new()));
        let levels = Arc::new(LevelAccumulator::new());
        let events = Arc::new(EventHub::new());
        let progress = events.progress();
        let level_rx = events.levels();

        let instance = Arc::new(PlaybackInstance::new(
            InstanceId(1),
            "3",
            "Boom",
            constant_clip(8000, 1000, 0.5),
            0.8,
        ));
        instances
            .lock()
            .unwrap()
            .insert(InstanceId(1), Arc::clone(&instance));
        levels.accumulate(&[0.5, -0.5]);

        let mut broadcaster = TelemetryBroadcaster::spawn(
            Arc::clone(&instances),
            Arc::clone(&levels),
            Arc::clone(&events),
            Duration::from_millis(5),
        )
        .unwrap();

        let snapshot = progress
            .recv_timeout(Duration::from_secs(2))
            .expect("no snapshot within timeout");
        assert_eq!(snapshot.instance_id, InstanceId(1));
        assert_eq!(snapshot.source_key, "3");
        assert_eq!(snapshot.display_name, "Boom");
        assert_eq!(snapshot.duration_ms, 8000);
        assert_eq!(snapshot.position_ms, 0);
        assert!(!snapshot.is_paused);

        let level = level_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("no level sample within timeout");
        assert!(level.peak > 0.0);

        broadcaster.stop();
    }

    #[test]
    fn stopped_instances_emit_no_further_snapshots() {
        let instances: Arc<Mutex<HashMap<InstanceId, Arc<PlaybackInstance>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let levels = Arc::new(LevelAccumulator::new());
        let events = Arc::new(EventHub::new());
        let progress = events.progress();

        let mut broadcaster = TelemetryBroadcaster::spawn(
            Arc::clone(&instances),
            Arc::clone(&levels),
            Arc::clone(&events),
            Duration::from_millis(5),
        )
        .unwrap();

        // Table is empty: ticks pass, nothing is emitted.
        assert!(progress.recv_timeout(Duration::from_millis(50)).is_err());
        broadcaster.stop();
    }
}
