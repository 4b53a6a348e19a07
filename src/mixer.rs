//! Block mixing of active instances, driven by the audio callback.
//!
//! The callback side holds the instance table only via `try_lock`: control
//! threads touch the table for O(1) structural work, so contention is rare
//! and a lost race costs one silent block instead of a priority inversion.

use crate::events::{EventHub, LevelSample};
use crate::playback::{InstanceId, PlaybackInstance};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Lock-free accumulator for peak/RMS metering. The audio callback folds
/// each mixed block in; the telemetry thread drains one window per tick.
pub(crate) struct LevelAccumulator {
    /// Running peak, f32 bits
    peak: AtomicU32,
    /// Running sum of squares, f32 bits
    sum_squares: AtomicU32,
    sample_count: AtomicUsize,
}

impl LevelAccumulator {
    pub(crate) fn new() -> Self {
        Self {
            peak: AtomicU32::new(0.0f32.to_bits()),
            sum_squares: AtomicU32::new(0.0f32.to_bits()),
            sample_count: AtomicUsize::new(0),
        }
    }

    /// Folds one mixed block into the current metering window.
    pub(crate) fn accumulate(&self, block: &[f32]) {
        if block.is_empty() {
            return;
        }

        let mut peak = 0.0f32;
        let mut sum_squares = 0.0f32;
        for sample in block {
            peak = peak.max(sample.abs());
            sum_squares += sample * sample;
        }

        let _ = self
            .peak
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let current = f32::from_bits(bits);
                (peak > current).then(|| peak.to_bits())
            });
        let _ = self
            .sum_squares
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f32::from_bits(bits) + sum_squares).to_bits())
            });
        self.sample_count.fetch_add(block.len(), Ordering::AcqRel);
    }

    /// Drains the current window and resets it for the next one.
    pub(crate) fn take(&self) -> LevelSample {
        let peak = f32::from_bits(self.peak.swap(0.0f32.to_bits(), Ordering::AcqRel));
        let sum_squares =
            f32::from_bits(self.sum_squares.swap(0.0f32.to_bits(), Ordering::AcqRel));
        let count = self.sample_count.swap(0, Ordering::AcqRel);

        if count == 0 {
            return LevelSample::SILENCE;
        }

        LevelSample {
            peak: peak.clamp(0.0, 1.0),
            rms: (sum_squares / count as f32).sqrt().clamp(0.0, 1.0),
        }
    }
}

/// Everything the audio callback needs, cloned into each stream closure.
/// Cheap Arc clones; the instance table itself is shared, which is what lets
/// active instances survive a device switch.
#[derive(Clone)]
pub(crate) struct MixerContext {
    pub(crate) instances: Arc<Mutex<HashMap<InstanceId, Arc<PlaybackInstance>>>>,
    /// Master volume, f32 bits in 0.0..=1.0
    pub(crate) master_volume: Arc<AtomicU32>,
    pub(crate) levels: Arc<LevelAccumulator>,
    pub(crate) events: Arc<EventHub>,
}

impl MixerContext {
    pub(crate) fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Acquire))
    }
}

/// Mixes one block of all Playing instances into `buffer` (interleaved,
/// zeroed here first), applies master volume, reaps naturally-completed
/// instances and feeds the level accumulator. Returns the number of frames
/// any instance contributed.
pub(crate) fn mix_block(ctx: &MixerContext, buffer: &mut [f32], channels: u16) -> usize {
    buffer.fill(0.0);

    let Ok(mut instances) = ctx.instances.try_lock() else {
        // A control op holds the table this block; play silence, never wait.
        log::debug!("Mixer skipped a block: instance table contended");
        return 0;
    };

    let mut frames_filled_max = 0;
    for instance in instances.values() {
        let frames = instance.mix_into(buffer, channels);
        frames_filled_max = frames_filled_max.max(frames);
    }

    // Reap natural completions in the same block that produced them so the
    // active set never holds a Stopped instance across a callback boundary.
    instances.retain(|id, instance| {
        if instance.is_finished() {
            ctx.events.emit_finished(*id);
            false
        } else {
            true
        }
    });
    drop(instances);

    let master = ctx.master_volume();
    if master != 1.0 {
        for sample in buffer.iter_mut() {
            *sample *= master;
        }
    }

    ctx.levels.accumulate(buffer);
    frames_filled_max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_data::test_support::constant_clip;
    use crate::events::EventHub;

    fn context(hub: &Arc<EventHub>) -> MixerContext {
        MixerContext {
            instances: Arc::new(Mutex::new(HashMap::new())),
            master_volume: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            levels: Arc::new(LevelAccumulator::new()),
            events: Arc::clone(hub),
        }
    }

    fn insert_instance(ctx: &MixerContext, id: u64, frames: usize, volume: f32) {
        let instance = PlaybackInstance::new(
            InstanceId(id),
            "3",
            "Boom",
            constant_clip(frames, 1000, 0.5),
            volume,
        );
        ctx.instances
            .lock()
            .unwrap()
            .insert(InstanceId(id), Arc::new(instance));
    }

    #[test]
    fn empty_table_yields_silence() {
        let hub = Arc::new(EventHub::new());
        let ctx = context(&hub);
        let mut buffer = vec![1.0f32; 16];
        assert_eq!(mix_block(&ctx, &mut buffer, 2), 0);
        assert!(buffer.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn layered_instances_sum() {
        let hub = Arc::new(EventHub::new());
        let ctx = context(&hub);
        insert_instance(&ctx, 1, 1000, 1.0);
        insert_instance(&ctx, 2, 1000, 1.0);

        let mut buffer = vec![0.0f32; 8];
        assert_eq!(mix_block(&ctx, &mut buffer, 2), 4);
        // Two mono 0.5-amplitude clips at full gain
        for sample in &buffer {
            assert!((sample - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn master_volume_zero_silences_without_touching_instance_volume() {
        let hub = Arc::new(EventHub::new());
        let ctx = context(&hub);
        insert_instance(&ctx, 1, 1000, 0.8);
        ctx.master_volume.store(0.0f32.to_bits(), Ordering::Release);

        let mut buffer = vec![0.0f32; 8];
        let frames = mix_block(&ctx, &mut buffer, 2);
        assert_eq!(frames, 4); // cursors still advance
        assert!(buffer.iter().all(|s| *s == 0.0));

        let instances = ctx.instances.lock().unwrap();
        let instance = instances.values().next().unwrap();
        assert!((instance.volume() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn natural_completion_emits_exactly_one_finished() {
        let hub = Arc::new(EventHub::new());
        let finished = hub.finished();
        let ctx = context(&hub);
        insert_instance(&ctx, 7, 4, 1.0);

        let mut buffer = vec![0.0f32; 16]; // 8 frames > 4-frame clip
        mix_block(&ctx, &mut buffer, 2);
        assert!(ctx.instances.lock().unwrap().is_empty());
        assert_eq!(finished.try_recv().unwrap(), InstanceId(7));
        assert!(finished.try_recv().is_err());

        // Later blocks emit nothing further.
        mix_block(&ctx, &mut buffer, 2);
        assert!(finished.try_recv().is_err());
    }

    #[test]
    fn control_side_removal_emits_no_finished() {
        let hub = Arc::new(EventHub::new());
        let finished = hub.finished();
        let ctx = context(&hub);
        insert_instance(&ctx, 3, 1000, 1.0);

        ctx.instances.lock().unwrap().remove(&InstanceId(3));
        let mut buffer = vec![0.0f32; 16];
        mix_block(&ctx, &mut buffer, 2);
        assert!(finished.try_recv().is_err());
    }

    #[test]
    fn level_accumulator_tracks_peak_and_rms() {
        let acc = LevelAccumulator::new();
        acc.accumulate(&[0.5, -0.5, 0.5, -0.5]);
        let sample = acc.take();
        assert!((sample.peak - 0.5).abs() < 1e-6);
        assert!((sample.rms - 0.5).abs() < 1e-6);

        // Window resets after take.
        assert_eq!(acc.take(), LevelSample::SILENCE);
    }
}
