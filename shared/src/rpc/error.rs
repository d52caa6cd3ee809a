use thiserror::Error;

use skein_serde::SerdeErr;

use crate::error::CodecError;

/// Errors raised while writing or reading RPC call records. Every variant
/// other than `RecordTooLarge` means the batch could not be framed and the
/// sending session must be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    /// A record's length prefix runs past the end of the batch
    #[error("RPC record declares {declared} bytes but only {remaining} remain in the batch")]
    TruncatedRecord { declared: usize, remaining: usize },

    /// A record's call header could not be read
    #[error("Malformed RPC call header: {0}")]
    MalformedHeader(#[from] SerdeErr),

    /// An invoked method left argument bytes unread
    #[error("Method {hash:#06x} left {remaining} argument bytes unread")]
    ResidualArguments { hash: u16, remaining: usize },

    /// An invoker's argument codec failed
    #[error("Method {hash:#06x} failed to decode its arguments: {source}")]
    Codec {
        hash: u16,
        #[source]
        source: CodecError,
    },

    /// A record is too long for its 16-bit length prefix
    #[error("RPC record of {length} bytes exceeds the {max} byte limit")]
    RecordTooLarge { length: usize, max: usize },
}
