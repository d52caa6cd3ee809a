use std::time::Duration;

use log::debug;

use crate::{
    clock::rtt_average::RttAverage,
    messages::control::{Ping, Pong},
};

/// Client-side estimate of round-trip time and of the server's timeline.
/// Times are seconds on the respective local clocks.
#[derive(Clone, Debug)]
pub struct ClockSync {
    rtt: RttAverage,
    offset: RttAverage,
}

impl ClockSync {
    pub fn new(window: usize) -> Self {
        Self {
            rtt: RttAverage::new(window),
            offset: RttAverage::new(window),
        }
    }

    /// Forgets every sample
    pub fn reset(&mut self) {
        self.rtt.clear();
        self.offset.clear();
    }

    pub fn ping(&self, local_time: f64) -> Ping {
        Ping {
            client_time: local_time,
        }
    }

    /// Records one round trip. Samples that would be negative are ignored.
    pub fn on_pong(&mut self, local_time: f64, pong: &Pong) {
        let sample = local_time - pong.client_time;
        if sample < 0.0 {
            debug!("Ignoring pong from the future ({:.3}s)", sample);
            return;
        }
        self.rtt.push(sample);
        self.offset
            .push(pong.server_time + sample / 2.0 - local_time);
    }

    pub fn has_samples(&self) -> bool {
        !self.rtt.is_empty()
    }

    /// Smoothed round-trip time in seconds
    pub fn rtt(&self) -> f64 {
        self.rtt.mean()
    }

    /// Estimated server clock at the given local time
    pub fn remote_time(&self, local_time: f64) -> f64 {
        local_time + self.offset.mean()
    }

    /// Point on the server timeline snapshots should be rendered at
    pub fn interpolation_time(&self, local_time: f64, delay: Duration) -> f64 {
        self.remote_time(local_time) - delay.as_secs_f64()
    }
}
