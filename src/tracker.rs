//! Observer-side progress tracking and seek reconciliation.
//!
//! Telemetry is asynchronous relative to commands, so a caller that seeks
//! and optimistically shows the target position can still receive a stale
//! snapshot computed before the seek took effect; applying it would roll
//! the displayed position backward. [`ProgressTracker`] implements the
//! required filtering contract: arm a recovery target before seeking,
//! discard snapshots that fall short of it, resume once the feed catches
//! up. The engine itself never needs to version its snapshots.

use crate::config::SEEK_TOLERANCE_MS;
use crate::events::ProgressSnapshot;
use crate::playback::InstanceId;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Default)]
struct Tracked {
    /// Armed recovery target; `None` outside a seek window.
    seek_target_ms: Option<u64>,
    last_accepted: Option<ProgressSnapshot>,
}

/// Per-instance snapshot filter and position extrapolator for one observer.
pub struct ProgressTracker {
    tolerance_ms: u64,
    entries: HashMap<InstanceId, Tracked>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::with_tolerance(SEEK_TOLERANCE_MS)
    }

    pub fn with_tolerance(tolerance_ms: u64) -> Self {
        Self {
            tolerance_ms,
            entries: HashMap::new(),
        }
    }

    /// Records the recovery target for an imminent seek. Call before (or
    /// atomically with) issuing the seek command.
    pub fn note_seek(&mut self, id: InstanceId, target_ms: u64) {
        self.entries.entry(id).or_default().seek_target_ms = Some(target_ms);
    }

    /// Offers a snapshot to the tracker. Returns `true` when the snapshot
    /// should be applied to the observer's view; `false` when it is stale
    /// relative to an armed seek target and must be discarded.
    pub fn apply(&mut self, snapshot: &ProgressSnapshot) -> bool {
        let entry = self.entries.entry(snapshot.instance_id).or_default();

        if let Some(target) = entry.seek_target_ms {
            if snapshot.position_ms < target.saturating_sub(self.tolerance_ms) {
                log::debug!(
                    "Discarding stale snapshot for instance {}: {} ms < target {} ms",
                    snapshot.instance_id,
                    snapshot.position_ms,
                    target
                );
                return false;
            }
            // Feed caught up with the seek; back to normal consumption.
            entry.seek_target_ms = None;
        }

        entry.last_accepted = Some(snapshot.clone());
        true
    }

    /// Whether a seek target is still armed for `id`.
    pub fn awaiting_seek(&self, id: InstanceId) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|e| e.seek_target_ms.is_some())
    }

    pub fn last_accepted(&self, id: InstanceId) -> Option<&ProgressSnapshot> {
        self.entries.get(&id)?.last_accepted.as_ref()
    }

    /// Displayed position at `now`: the last accepted position, extrapolated
    /// forward by wall-clock time while playing, clamped to the clip
    /// duration. Frozen while paused.
    pub fn position_at(&self, id: InstanceId, now: Instant) -> Option<u64> {
        let last = self.last_accepted(id)?;
        if last.is_paused {
            return Some(last.position_ms);
        }
        let elapsed_ms = now.saturating_duration_since(last.sync_time).as_millis() as u64;
        Some((last.position_ms + elapsed_ms).min(last.duration_ms))
    }

    /// Drops all tracking state for an instance that stopped or finished.
    pub fn forget(&mut self, id: InstanceId) {
        self.entries.remove(&id);
    }
}
