use std::default::Default;

use crate::transport::Reliability;

/// Contains Config properties which will be used by a Server or Client
/// session
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Largest body, in bytes, a single outbound chunk may carry. Frames
    /// larger than this are split into several chunks.
    pub max_chunk_payload: usize,
    /// Number of incomplete frames kept in the reassembly buffer before the
    /// oldest is evicted
    pub max_pending_frames: usize,
    /// Reliability requested from the transport for entity update frames
    pub update_reliability: Reliability,
    /// Largest frame, in bytes, either side will assemble or send
    pub max_frame_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_chunk_payload: 1200,
            max_pending_frames: 64,
            update_reliability: Reliability::Reliable,
            max_frame_size: 1024 * 1024,
        }
    }
}
