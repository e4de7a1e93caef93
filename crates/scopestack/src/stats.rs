//! Per-stack counters
//!
//! Counting is enabled per stack through [`StackConfig::track_stats`] and
//! compiled in with the `stats` feature. A stack belongs to one thread, so the
//! counters are plain `Cell`s rather than atomics.
//!
//! [`StackConfig::track_stats`]: crate::StackConfig::track_stats

use core::cell::Cell;

/// Snapshot of a stack's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackStats {
    /// Frames pushed
    pub frames_pushed: u64,
    /// Frames popped, by guard or explicitly
    pub frames_popped: u64,
    /// Deepest nesting observed
    pub peak_depth: usize,
    /// Allocations recorded in a frame
    pub tracked_allocations: u64,
    /// Allocations made with no active frame
    pub passthrough_allocations: u64,
    /// Explicit releases that freed memory
    pub releases: u64,
    /// Blocks freed because their frame was popped
    pub exit_releases: u64,
    /// Successful resizes
    pub resizes: u64,
    /// Adopted addresses
    pub adoptions: u64,
    /// Addresses moved to the parent frame or out of the bottom frame
    pub promotions: u64,
    /// Rejected ownership-set inserts
    pub tracking_failures: u64,
}

impl StackStats {
    /// Frames pushed and not yet popped
    #[must_use]
    pub fn live_frames(&self) -> u64 {
        self.frames_pushed.saturating_sub(self.frames_popped)
    }
}

#[derive(Debug)]
pub(crate) struct StatsRecorder {
    enabled: bool,
    stats: Cell<StackStats>,
}

impl StatsRecorder {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled: enabled && cfg!(feature = "stats"),
            stats: Cell::new(StackStats::default()),
        }
    }

    #[inline]
    pub(crate) fn record(&self, update: impl FnOnce(&mut StackStats)) {
        if self.enabled {
            let mut stats = self.stats.get();
            update(&mut stats);
            self.stats.set(stats);
        }
    }

    pub(crate) fn snapshot(&self) -> StackStats {
        self.stats.get()
    }

    pub(crate) fn reset(&self) {
        self.stats.set(StackStats::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "stats")]
    fn recorder_accumulates() {
        let recorder = StatsRecorder::new(true);
        recorder.record(|s| s.frames_pushed += 2);
        recorder.record(|s| s.frames_popped += 1);

        let stats = recorder.snapshot();
        assert_eq!(stats.frames_pushed, 2);
        assert_eq!(stats.live_frames(), 1);

        recorder.reset();
        assert_eq!(recorder.snapshot(), StackStats::default());
    }

    #[test]
    fn disabled_recorder_stays_zero() {
        let recorder = StatsRecorder::new(false);
        recorder.record(|s| s.releases += 1);
        assert_eq!(recorder.snapshot(), StackStats::default());
    }
}
