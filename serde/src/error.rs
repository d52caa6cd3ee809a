use thiserror::Error;

/// Errors raised while reading values out of a byte stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// The reader ran out of bytes before the value was complete
    #[error("Unexpected end of buffer: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// A variable-length integer used more continuation bytes than a u64 can hold
    #[error("Variable-length integer overflows 64 bits")]
    VarIntOverflow,

    /// A bool was encoded as something other than 0 or 1
    #[error("Invalid bool encoding: {0}")]
    InvalidBool(u8),

    /// A string payload was not valid UTF-8
    #[error("String payload is not valid UTF-8")]
    InvalidUtf8,

    /// An enum discriminant did not match any known variant
    #[error("Invalid tag {tag} for {type_name}")]
    InvalidTag { type_name: &'static str, tag: u16 },
}
