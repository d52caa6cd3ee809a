pub mod clock_sync;
pub mod ping_config;
pub mod rtt_average;
