use std::time::{Duration, Instant};

use crate::component::dirty_mask::DirtyMask;

/// Tracks which fields of one component instance changed since the last
/// sync, and throttles how often the component may be sent.
#[derive(Clone, Debug)]
pub struct ChangeTracker {
    dirty: DirtyMask,
    owner_written: DirtyMask,
    min_interval: Duration,
    last_sync: Option<Instant>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::with_min_interval(Duration::ZERO)
    }

    pub fn with_min_interval(min_interval: Duration) -> Self {
        Self {
            dirty: DirtyMask::EMPTY,
            owner_written: DirtyMask::EMPTY,
            min_interval,
            last_sync: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn set_min_interval(&mut self, min_interval: Duration) {
        self.min_interval = min_interval;
    }

    pub fn mark_dirty(&mut self, bit: u8) {
        self.dirty.set_bit(bit);
    }

    /// Marks `mask` dirty as the result of the owning peer's own writes
    pub fn mark_owner_written(&mut self, mask: DirtyMask) {
        self.dirty |= mask;
        self.owner_written |= mask;
    }

    pub fn dirty(&self) -> DirtyMask {
        self.dirty
    }

    pub fn owner_written(&self) -> DirtyMask {
        self.owner_written
    }

    /// Whether any bit is set, regardless of the resend interval
    pub fn has_pending(&self) -> bool {
        !self.dirty.is_clear()
    }

    /// True iff any bit is set and the minimum interval has elapsed since the
    /// last clear
    pub fn is_dirty(&self, now: Instant) -> bool {
        if self.dirty.is_clear() {
            return false;
        }
        match self.last_sync {
            None => true,
            Some(last_sync) => now.saturating_duration_since(last_sync) >= self.min_interval,
        }
    }

    pub fn clear(&mut self, now: Instant) {
        self.dirty.clear();
        self.owner_written.clear();
        self.last_sync = Some(now);
    }

    /// Drops pending bits without counting as a sync
    pub fn discard(&mut self) {
        self.dirty.clear();
        self.owner_written.clear();
    }
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}
