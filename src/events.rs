//! Event surface: progress snapshots, level samples, completion and device
//! error notifications.
//!
//! Each event category has its own bounded channel. `progress` and
//! `finished` are never dropped silently (an overflow is logged loudly);
//! `level` samples are informational and coalesce to the newest value under
//! backpressure. Receivers are crossbeam queues with at-least-one-consumer
//! semantics: each event is delivered to exactly one of the subscribed
//! receivers.

use crate::error::DeviceError;
use crate::playback::InstanceId;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use std::time::Instant;

pub const PROGRESS_CHANNEL_CAPACITY: usize = 1024;
pub const FINISHED_CHANNEL_CAPACITY: usize = 256;
pub const LEVEL_CHANNEL_CAPACITY: usize = 8;
pub const DEVICE_ERROR_CHANNEL_CAPACITY: usize = 64;

/// Periodic, timestamped report of one instance's authoritative position.
/// Never mutated after emission; each telemetry tick emits fresh values.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub source_key: String,
    pub instance_id: InstanceId,
    pub display_name: String,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_paused: bool,
    /// Wall-clock time at which `position_ms` was authoritative; observers
    /// extrapolate forward from here between ticks.
    pub sync_time: Instant,
}

/// Peak and RMS of the mixed master signal over the most recent metering
/// window, both normalized to 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSample {
    pub peak: f32,
    pub rms: f32,
}

impl LevelSample {
    pub const SILENCE: LevelSample = LevelSample { peak: 0.0, rms: 0.0 };
}

struct Channel<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Channel<T> {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity);
        Self { tx, rx }
    }

    /// Sends, evicting the oldest queued event on overflow so the newest
    /// value survives.
    fn send_coalescing(&self, value: T) {
        let mut value = value;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return,
                Err(TrySendError::Full(v)) => {
                    let _ = self.rx.try_recv();
                    value = v;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

/// Publish/subscribe hub connecting the engine to external observers.
pub struct EventHub {
    progress: Channel<ProgressSnapshot>,
    finished: Channel<InstanceId>,
    levels: Channel<LevelSample>,
    device_errors: Channel<DeviceError>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        Self {
            progress: Channel::new(PROGRESS_CHANNEL_CAPACITY),
            finished: Channel::new(FINISHED_CHANNEL_CAPACITY),
            levels: Channel::new(LEVEL_CHANNEL_CAPACITY),
            device_errors: Channel::new(DEVICE_ERROR_CHANNEL_CAPACITY),
        }
    }

    /// One snapshot per active instance per telemetry tick.
    pub fn progress(&self) -> Receiver<ProgressSnapshot> {
        self.progress.rx.clone()
    }

    /// One id per natural end-of-clip completion. Explicit stops emit nothing.
    pub fn finished(&self) -> Receiver<InstanceId> {
        self.finished.rx.clone()
    }

    /// One mixed-output level sample per telemetry tick.
    pub fn levels(&self) -> Receiver<LevelSample> {
        self.levels.rx.clone()
    }

    /// Stream failures of the active output device.
    pub fn device_errors(&self) -> Receiver<DeviceError> {
        self.device_errors.rx.clone()
    }

    pub(crate) fn emit_progress(&self, snapshot: ProgressSnapshot) {
        if let Err(TrySendError::Full(snapshot)) = self.progress.tx.try_send(snapshot) {
            log::warn!(
                "Progress queue full; evicting oldest snapshot (instance {})",
                snapshot.instance_id
            );
            self.progress.send_coalescing(snapshot);
        }
    }

    /// Queued from the audio callback; lock-free and alloc-free.
    pub(crate) fn emit_finished(&self, id: InstanceId) {
        if self.finished.tx.try_send(id).is_err() {
            // Losing one of these leaves observer-side counters wrong, so
            // shout rather than drop silently.
            log::error!("Finished queue full; completion of instance {} was lost", id);
        }
    }

    pub(crate) fn emit_level(&self, sample: LevelSample) {
        self.levels.send_coalescing(sample);
    }

    pub(crate) fn emit_device_error(&self, error: DeviceError) {
        log::error!("Device error: {}", error);
        self.device_errors.send_coalescing(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_events_are_delivered_in_order() {
        let hub = EventHub::new();
        let rx = hub.finished();
        hub.emit_finished(InstanceId(1));
        hub.emit_finished(InstanceId(2));
        assert_eq!(rx.try_recv().unwrap(), InstanceId(1));
        assert_eq!(rx.try_recv().unwrap(), InstanceId(2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn level_samples_coalesce_under_backpressure() {
        let hub = EventHub::new();
        let rx = hub.levels();
        for i in 0..(LEVEL_CHANNEL_CAPACITY + 5) {
            hub.emit_level(LevelSample {
                peak: i as f32 / 100.0,
                rms: 0.0,
            });
        }
        // The newest sample survived eviction.
        let newest = (LEVEL_CHANNEL_CAPACITY + 4) as f32 / 100.0;
        let mut last = None;
        while let Ok(sample) = rx.try_recv() {
            last = Some(sample);
        }
        assert_eq!(last.unwrap().peak, newest);
    }
}
