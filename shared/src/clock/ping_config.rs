use std::{default::Default, time::Duration};

/// Contains Config properties used to drive clock synchronization
#[derive(Clone, Debug)]
pub struct PingConfig {
    /// How often the client sends a ping while connected
    pub ping_interval: Duration,
    /// Number of samples the round-trip moving average spans
    pub rtt_window: usize,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(2),
            rtt_window: 6,
        }
    }
}
