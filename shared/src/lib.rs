//! # Skein Shared
//! Common functionality shared between skein-server & skein-client crates:
//! change tracking and delta serialization, the codec registry, replicated
//! entities, RPC dispatch, sessions and framing, clock sync and the
//! transport boundary.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use skein_serde::{
    ByteCounter, ByteReader, ByteWrite, ByteWriter, Serde, SerdeErr, SignedVariableInteger,
    UnsignedVariableInteger,
};

mod callbacks;
mod clock;
mod codec;
mod component;
mod connection;
mod constants;
mod entity;
mod error;
mod messages;
mod rpc;
mod timer;
mod transport;
mod types;
mod wrapping_number;

pub use callbacks::LifecycleCallbacks;
pub use clock::{clock_sync::ClockSync, ping_config::PingConfig, rtt_average::RttAverage};
pub use codec::codec_registry::CodecRegistry;
pub use component::{
    change_tracker::ChangeTracker,
    dirty_mask::{DirtyBits, DirtyMask},
    replicate::Replicated,
    schema::{ComponentSchema, FieldDescriptor, ReplicationDirection, SchemaBuilder},
};
pub use connection::{
    connection_config::ConnectionConfig,
    error::{FramingError, SessionError},
    frame::{fragment, ChunkHeader, Frame},
    message_kind::MessageKind,
    reassembly::Reassembly,
    session::{ConnectionState, Session},
};
pub use constants::{
    CHUNK_HEADER_BYTES, FRAME_KIND_BYTES, MAX_COMPONENTS_PER_ENTITY, MAX_FIELDS_PER_COMPONENT,
    RPC_RECORD_PREFIX_BYTES,
};
pub use entity::{
    entity_reader::{AppliedMask, ApplyPolicy},
    entity_writer::EntityPayloads,
    error::EntityError,
    replicated_entity::{EntityState, ReplicatedEntity},
};
pub use error::{CodecError, ConfigError};
pub use messages::{
    control::{Ping, Pong, SceneChange},
    spawn::{DespawnRecord, OwnerRecord, Pose, SpawnOrigin, SpawnRecord},
    update::{EntityUpdate, EntityUpdates},
};
pub use rpc::{
    call_record::{RpcBatchReader, RpcCall, RpcCallHeader, RpcKind},
    dispatcher::{
        CallerInfo, DispatchOutcome, DropReason, RpcContext, RpcDispatcher, RpcInvoker, RpcTarget,
    },
    error::RpcError,
    method_hash::MethodHash,
};
pub use timer::Timer;
pub use transport::{
    error::TransportError,
    event_queue::{EventQueue, EventSender, TransportEvent},
    Reliability, Transport,
};
pub use types::{ComponentId, EntityId, HostType, PeerId};
pub use wrapping_number::{sequence_greater_than, sequence_less_than};
