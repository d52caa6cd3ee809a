use thiserror::Error;

use skein_serde::SerdeErr;

/// Errors detected while setting up codecs, schemas, entities or RPC tables.
/// These abort setup and never surface from a tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A codec was registered twice for the same type
    #[error("Codec for type {type_name} is already registered")]
    DuplicateCodec { type_name: &'static str },

    /// A replicated field uses a type no codec was registered for
    #[error("Field '{field}' of component {component} uses type {type_name}, which has no registered codec")]
    UnregisteredCodec {
        component: &'static str,
        field: &'static str,
        type_name: &'static str,
    },

    /// A component declares more replicated fields than a dirty mask can address
    #[error("Component {component} declares {count} replicated fields, the limit is {max}")]
    TooManyFields {
        component: &'static str,
        count: usize,
        max: usize,
    },

    /// An entity was built with more components than an entity mask can address
    #[error("Entity has {count} components, the limit is {max}")]
    TooManyComponents { count: usize, max: usize },

    /// The same method signature was registered twice
    #[error("Method '{signature}' is already registered under hash {hash:#06x}")]
    DuplicateMethodHash { signature: String, hash: u16 },

    /// Two different method signatures hash to the same value
    #[error("Method '{signature}' collides with '{existing}' on hash {hash:#06x}")]
    MethodHashCollision {
        signature: String,
        existing: String,
        hash: u16,
    },
}

/// Errors raised when encoding or decoding a field through the codec registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// No codec is registered for the requested type
    #[error("No codec registered for type {type_name}")]
    MissingCodec { type_name: &'static str },

    /// The value handed to a codec was not of the type it was registered for
    #[error("Codec for {expected} was handed a value of another type")]
    TypeMismatch { expected: &'static str },

    /// A component was asked to encode or decode a field it does not have
    #[error("Component {component} has no field at index {index}")]
    FieldOutOfRange { component: &'static str, index: u8 },

    /// The underlying byte stream could not be read
    #[error("Codec failed to read value: {0}")]
    Serde(#[from] SerdeErr),
}
