use thiserror::Error;

use skein_serde::SerdeErr;

use crate::{entity::replicated_entity::EntityState, error::CodecError, types::ComponentId};

/// Errors raised while mutating, serializing or applying a replicated entity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// A component index addressed a slot the entity does not have
    #[error("Component index {index} is out of range for an entity with {count} components")]
    ComponentOutOfRange { index: ComponentId, count: usize },

    /// A field bit addressed a field the component does not declare
    #[error("Field {index} is out of range for component {component} with {count} fields")]
    FieldOutOfRange {
        component: &'static str,
        index: u8,
        count: usize,
    },

    /// The component at an index is not of the requested type
    #[error("Component {index} is a {actual}, not a {expected}")]
    ComponentTypeMismatch {
        index: ComponentId,
        expected: &'static str,
        actual: &'static str,
    },

    /// A field codec failed while writing or reading a component
    #[error("Codec failure in component {component}: {source}")]
    Codec {
        component: &'static str,
        #[source]
        source: CodecError,
    },

    /// The payload's masks could not be read
    #[error("Malformed entity payload: {0}")]
    Malformed(#[from] SerdeErr),

    /// Bytes were left over after every announced field was read
    #[error("Entity payload carries {count} unread trailing bytes")]
    TrailingBytes { count: usize },

    /// An upstream payload wrote a component only the server may write
    #[error("Peer wrote server-authoritative component {component}")]
    DirectionViolation { component: &'static str },

    /// A lifecycle transition was attempted from the wrong state
    #[error("Entity cannot {action} while {state:?}")]
    WrongState {
        action: &'static str,
        state: EntityState,
    },
}

impl EntityError {
    /// Authority violations are dropped with a warning; every other apply
    /// failure leaves the sender's state in doubt
    pub fn is_authority_violation(&self) -> bool {
        matches!(self, EntityError::DirectionViolation { .. })
    }
}
