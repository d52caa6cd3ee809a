use skein_serde::{ByteReader, ByteWrite, Serde, SerdeErr};

use crate::types::EntityId;

/// One entity's delta payload inside an `EntityUpdates` or `OwnerUpdates`
/// frame. The payload is length-prefixed so a receiver can skip an entity
/// it does not know.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityUpdate {
    pub entity: EntityId,
    pub payload: Vec<u8>,
}

impl EntityUpdate {
    pub fn new(entity: EntityId, payload: Vec<u8>) -> Self {
        Self { entity, payload }
    }
}

impl Serde for EntityUpdate {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.entity.ser(writer);
        self.payload.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            entity: EntityId::de(reader)?,
            payload: Vec::<u8>::de(reader)?,
        })
    }
}

/// Body of both update frame kinds
pub type EntityUpdates = Vec<EntityUpdate>;
