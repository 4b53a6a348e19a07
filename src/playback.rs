//! Playback instances and their state machine.
//!
//! A [`PlaybackInstance`] is one live "play" of a soundboard button: it owns
//! a cursor into a shared decoded clip, a volume, and a paused flag. The
//! fields touched by both the control thread and the audio callback are
//! atomics, so commands never contend with the mixer for longer than a
//! single word write.

use crate::audio_data::CueboardAudioData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// Process-unique handle for a playback instance.
///
/// Ids are allocated from a monotonically increasing counter and never
/// reused, so a stale id can only ever miss, never alias a newer instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Playback state of an instance.
///
/// `Stopped` is terminal: it is entered by explicit stop or by natural
/// completion, and an instance in that state is removed from the active
/// table in the same step, so observers never see a resident Stopped
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
    Stopped,
}

/// One active playback of a clip.
pub struct PlaybackInstance {
    id: InstanceId,
    source_key: String,
    display_name: String,
    data: Arc<CueboardAudioData>,
    /// Frame position into `data`. Written by the mixer (advance) and the
    /// control thread (seek); the mixer publishes advances with a
    /// compare-exchange so a concurrent seek always wins.
    cursor: AtomicUsize,
    paused: AtomicBool,
    /// Per-instance volume, f32 bits in 0.0..=1.0
    volume: AtomicU32,
    finished: AtomicBool,
}

impl PlaybackInstance {
    pub(crate) fn new(
        id: InstanceId,
        source_key: impl Into<String>,
        display_name: impl Into<String>,
        data: Arc<CueboardAudioData>,
        volume: f32,
    ) -> Self {
        Self {
            id,
            source_key: source_key.into(),
            display_name: display_name.into(),
            data,
            cursor: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            volume: AtomicU32::new(volume.clamp(0.0, 1.0).to_bits()),
            finished: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn data(&self) -> &Arc<CueboardAudioData> {
        &self.data
    }

    pub fn duration_ms(&self) -> u64 {
        self.data.duration_ms()
    }

    /// Current position in milliseconds, derived from the frame cursor.
    pub fn position_ms(&self) -> u64 {
        let frames = self.cursor.load(Ordering::Acquire).min(self.data.total_frames());
        frames as u64 * 1000 / self.data.sample_rate().max(1) as u64
    }

    pub(crate) fn position_frames(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Moves the cursor to `position_ms`, clamped to the clip duration.
    /// Takes effect on the next block the mixer processes.
    pub fn seek_ms(&self, position_ms: u64) {
        let position_ms = position_ms.min(self.duration_ms());
        let frames = (position_ms as u128 * self.data.sample_rate() as u128 / 1000) as usize;
        let frames = frames.min(self.data.total_frames());
        log::debug!("Instance {} seeking to {} ms (frame {})", self.id, position_ms, frames);
        self.cursor.store(frames, Ordering::Release);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Acquire))
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pauses the instance. Idempotent; returns the resulting paused flag.
    pub fn pause(&self) -> bool {
        self.paused.store(true, Ordering::Release);
        log::debug!("Instance {} paused at frame {}", self.id, self.position_frames());
        true
    }

    /// Resumes the instance. Idempotent; returns the resulting paused flag.
    pub fn resume(&self) -> bool {
        self.paused.store(false, Ordering::Release);
        log::debug!("Instance {} resumed at frame {}", self.id, self.position_frames());
        false
    }

    /// Flips between Playing and Paused; returns the resulting paused flag.
    pub fn toggle_pause(&self) -> bool {
        let was_paused = self.paused.fetch_xor(true, Ordering::AcqRel);
        !was_paused
    }

    pub fn state(&self) -> PlayState {
        if self.finished.load(Ordering::Acquire) {
            PlayState::Stopped
        } else if self.is_paused() {
            PlayState::Paused
        } else {
            PlayState::Playing
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Mixes the next block of this instance into `buffer` (interleaved,
    /// `out_channels` wide), scaled by the instance volume. Returns the
    /// number of frames consumed; paused instances consume none and
    /// contribute silence.
    ///
    /// The advanced cursor is published with a compare-exchange: if a seek
    /// stored a new position while this block was being mixed, the seek's
    /// value is kept and the next block reads from there.
    pub(crate) fn mix_into(&self, buffer: &mut [f32], out_channels: u16) -> usize {
        if self.paused.load(Ordering::Acquire) || self.is_finished() {
            return 0;
        }

        let start = self.cursor.load(Ordering::Acquire);
        let total = self.data.total_frames();
        if start >= total {
            self.finished.store(true, Ordering::Release);
            return 0;
        }

        let out_ch = out_channels as usize;
        let src_ch = self.data.channels() as usize;
        let frame_count = buffer.len() / out_ch;
        let frames = frame_count.min(total - start);
        let gain = self.volume();
        let samples = self.data.samples();

        for frame_idx in 0..frames {
            let src_base = (start + frame_idx) * src_ch;
            let frame = &samples[src_base..src_base + src_ch];
            for ch in 0..out_ch {
                let sample = if src_ch == 1 {
                    frame[0]
                } else if src_ch >= out_ch {
                    frame[ch]
                } else {
                    frame[ch % src_ch]
                };
                buffer[frame_idx * out_ch + ch] += sample * gain;
            }
        }

        let end = start + frames;
        let advanced = self
            .cursor
            .compare_exchange(start, end, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if advanced && end >= total {
            self.finished.store(true, Ordering::Release);
            log::debug!("Instance {} reached end at frame {}", self.id, end);
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_data::test_support::constant_clip;

    fn instance(frames: usize, volume: f32) -> PlaybackInstance {
        PlaybackInstance::new(
            InstanceId(1),
            "3",
            "Boom",
            constant_clip(frames, 1000, 0.5),
            volume,
        )
    }

    #[test]
    fn starts_playing_at_zero() {
        let inst = instance(1000, 0.8);
        assert_eq!(inst.position_ms(), 0);
        assert!(!inst.is_paused());
        assert_eq!(inst.state(), PlayState::Playing);
        assert_eq!(inst.duration_ms(), 1000);
    }

    #[test]
    fn volume_is_clamped() {
        let inst = instance(100, 2.5);
        assert_eq!(inst.volume(), 1.0);
        inst.set_volume(-1.0);
        assert_eq!(inst.volume(), 0.0);
        inst.set_volume(0.3);
        assert_eq!(inst.volume(), 0.3);
    }

    #[test]
    fn mix_scales_and_advances() {
        let inst = instance(1000, 0.5);
        let mut buffer = vec![0.0f32; 32]; // 16 stereo frames
        let frames = inst.mix_into(&mut buffer, 2);
        assert_eq!(frames, 16);
        // mono 0.5 amplitude fanned to both channels at gain 0.5
        for sample in &buffer {
            assert!((sample - 0.25).abs() < 1e-6);
        }
        assert_eq!(inst.position_frames(), 16);
    }

    #[test]
    fn paused_instance_contributes_silence_and_holds_position() {
        let inst = instance(1000, 1.0);
        let mut buffer = vec![0.0f32; 16];
        inst.mix_into(&mut buffer, 2);
        let before = inst.position_frames();

        assert!(inst.pause());
        assert!(inst.pause()); // idempotent
        let mut buffer = vec![0.0f32; 16];
        assert_eq!(inst.mix_into(&mut buffer, 2), 0);
        assert!(buffer.iter().all(|s| *s == 0.0));
        assert_eq!(inst.position_frames(), before);

        assert!(!inst.resume());
        assert!(!inst.resume()); // idempotent
        assert_eq!(inst.position_frames(), before);
    }

    #[test]
    fn toggle_pause_round_trips() {
        let inst = instance(100, 1.0);
        assert!(inst.toggle_pause());
        assert_eq!(inst.state(), PlayState::Paused);
        assert!(!inst.toggle_pause());
        assert_eq!(inst.state(), PlayState::Playing);
    }

    #[test]
    fn seek_clamps_to_duration() {
        let inst = instance(1000, 1.0); // 1000 frames @ 1 kHz = 1000 ms
        inst.seek_ms(250);
        assert_eq!(inst.position_ms(), 250);
        inst.seek_ms(99_999);
        assert_eq!(inst.position_ms(), 1000);
    }

    #[test]
    fn seek_overrides_prior_advance() {
        let inst = instance(1000, 1.0);
        let mut buffer = vec![0.0f32; 64];
        inst.mix_into(&mut buffer, 2);
        inst.seek_ms(500);
        assert_eq!(inst.position_frames(), 500);
        // Next block reads from the seek target, not the old cursor.
        inst.mix_into(&mut buffer, 2);
        assert_eq!(inst.position_frames(), 532);
    }

    #[test]
    fn reaching_end_marks_finished_once() {
        let inst = instance(8, 1.0);
        let mut buffer = vec![0.0f32; 32]; // 16 frames, more than the clip has
        let frames = inst.mix_into(&mut buffer, 2);
        assert_eq!(frames, 8);
        assert!(inst.is_finished());
        assert_eq!(inst.state(), PlayState::Stopped);
        assert_eq!(inst.mix_into(&mut buffer, 2), 0);
    }

    #[test]
    fn stereo_clip_mixes_per_channel() {
        let samples = vec![0.1f32, 0.9, 0.1, 0.9]; // 2 stereo frames: L=0.1 R=0.9
        let data = Arc::new(CueboardAudioData::new(
            samples,
            1000,
            2,
            std::time::Duration::from_millis(2),
        ));
        let inst = PlaybackInstance::new(InstanceId(2), "k", "Pan", data, 1.0);
        let mut buffer = vec![0.0f32; 4];
        assert_eq!(inst.mix_into(&mut buffer, 2), 2);
        assert!((buffer[0] - 0.1).abs() < 1e-6);
        assert!((buffer[1] - 0.9).abs() < 1e-6);
    }
}
