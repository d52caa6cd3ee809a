use std::time::{Duration, Instant};

/// A Timer with a given duration after which it will enter into a "Ringing"
/// state. The Timer can be reset at an given time, or manually set to start
/// "Ringing" again.
pub struct Timer {
    duration: Duration,
    last: Option<Instant>,
}

impl Timer {
    /// Creates a new Timer with a given Duration. It rings on its first check.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            last: None,
        }
    }

    /// Reset the Timer to stop ringing and wait another full duration
    pub fn reset(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// Causes the timer to ring on the next check
    pub fn ring_manual(&mut self) {
        self.last = None;
    }

    /// Gets whether or not the Timer is "Ringing" (i.e. the given duration has
    /// elapsed since the last "reset")
    pub fn ringing(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.duration,
        }
    }
}
