//! # Skein Client
//! Mirrors the entities a skein server replicates to this peer: resolves
//! spawn records through an [`AssetResolver`], applies field deltas, sends
//! writes to owned entities upstream, and estimates the server clock.

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

mod asset;
mod client_config;
mod client_entity;
mod error;
mod replication_client;

pub use asset::{AssetCompleter, AssetComponents, AssetError, AssetLoad, AssetResolver};
pub use client_config::ClientConfig;
pub use client_entity::ClientEntity;
pub use error::ClientError;
pub use replication_client::ReplicationClient;
