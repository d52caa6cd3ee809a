use std::fmt;

use skein_serde::{ByteReader, ByteWrite, Serde, SerdeErr, UnsignedVariableInteger};

/// Index of a component inside its entity's ordered component list
pub type ComponentId = u8;

/// Identifier of a replicated entity, assigned by the director on spawn.
/// `0` is reserved to mean "unassigned".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);

impl EntityId {
    pub const UNASSIGNED: EntityId = EntityId(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn to_u32(self) -> u32 {
        self.0
    }

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

impl Serde for EntityId {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        UnsignedVariableInteger::new(self.0).ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let value = UnsignedVariableInteger::de(reader)?.get();
        let value = u32::try_from(value).map_err(|_| SerdeErr::VarIntOverflow)?;
        Ok(Self(value))
    }
}

/// Identifier of a transport peer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u64);

impl PeerId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn to_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HostType {
    Server,
    Client,
}

impl HostType {
    pub fn invert(self) -> Self {
        match self {
            HostType::Server => HostType::Client,
            HostType::Client => HostType::Server,
        }
    }
}
