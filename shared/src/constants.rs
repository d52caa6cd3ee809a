/// Upper bound on replicated fields per component, one bit each in a `DirtyMask`
pub const MAX_FIELDS_PER_COMPONENT: usize = 64;

/// Upper bound on components per entity, one bit each in the entity mask
pub const MAX_COMPONENTS_PER_ENTITY: usize = 64;

// Framing

/// Bytes in a chunk header: frame sequence, fragment index, fragment count
pub const CHUNK_HEADER_BYTES: usize = 6;

/// Bytes in the message-kind prefix of every frame
pub const FRAME_KIND_BYTES: usize = 2;

/// Bytes in the length prefix of every RPC call record
pub const RPC_RECORD_PREFIX_BYTES: usize = 2;
