//! # Skein Server
//! The authoritative side of skein: a [`ReplicationDirector`] that owns the
//! entity table, tracks which connected peers observe which entities, and
//! sends spawn records, field deltas and remote calls to them.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use skein_shared::{
        ByteReader, ByteWrite, ByteWriter, CodecRegistry, ComponentSchema, EntityId, MethodHash,
        PeerId, Replicated, ReplicationDirection, RpcKind, Serde, SerdeErr,
    };
}

mod director;
mod error;
mod interest;
mod server_entity;

pub use director::{
    replication_director::{DespawnMode, ReplicationDirector},
    server_config::{OwnedEntityPolicy, ServerConfig},
};
pub use error::ServerError;
pub use interest::{InterestPolicy, ObserveAll};
pub use server_entity::ServerEntity;
