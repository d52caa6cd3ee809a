use skein_serde::{ByteReader, ByteWrite, Serde, SerdeErr, UnsignedVariableInteger};

use crate::types::EntityId;

/// What the receiving side instantiates a spawned entity from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnOrigin {
    /// A prefab-like asset, instantiated fresh
    Asset(u32),
    /// An entity pre-placed in the shared scene
    Scene(u64),
}

impl Serde for SpawnOrigin {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        match self {
            SpawnOrigin::Asset(asset) => {
                0u8.ser(writer);
                UnsignedVariableInteger::new(*asset).ser(writer);
            }
            SpawnOrigin::Scene(scene_id) => {
                1u8.ser(writer);
                UnsignedVariableInteger::new(*scene_id).ser(writer);
            }
        }
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        let tag = u8::de(reader)?;
        let value = UnsignedVariableInteger::de(reader)?.get();
        match tag {
            0 => {
                let asset = u32::try_from(value).map_err(|_| SerdeErr::VarIntOverflow)?;
                Ok(SpawnOrigin::Asset(asset))
            }
            1 => Ok(SpawnOrigin::Scene(value)),
            tag => Err(SerdeErr::InvalidTag {
                type_name: "SpawnOrigin",
                tag: u16::from(tag),
            }),
        }
    }
}

/// Initial transform carried by a spawn record
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: [f32; 3],
    /// Quaternion, `[x, y, z, w]`
    pub rotation: [f32; 4],
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
    };

    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Serde for Pose {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.position.ser(writer);
        self.rotation.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            position: <[f32; 3]>::de(reader)?,
            rotation: <[f32; 4]>::de(reader)?,
        })
    }

    fn byte_length(&self) -> usize {
        28
    }
}

/// Everything a peer needs to instantiate an entity it has never seen
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnRecord {
    pub entity: EntityId,
    pub origin: SpawnOrigin,
    /// True only in the record sent to the owning peer
    pub is_owner: bool,
    pub pose: Option<Pose>,
    /// Full serialization of every component
    pub payload: Vec<u8>,
}

impl Serde for SpawnRecord {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.entity.ser(writer);
        self.origin.ser(writer);
        self.is_owner.ser(writer);
        self.pose.ser(writer);
        self.payload.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            entity: EntityId::de(reader)?,
            origin: SpawnOrigin::de(reader)?,
            is_owner: bool::de(reader)?,
            pose: Option::<Pose>::de(reader)?,
            payload: Vec::<u8>::de(reader)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DespawnRecord {
    pub entity: EntityId,
}

impl Serde for DespawnRecord {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.entity.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            entity: EntityId::de(reader)?,
        })
    }
}

/// Tells a peer whether it now owns an entity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OwnerRecord {
    pub entity: EntityId,
    pub is_owner: bool,
}

impl Serde for OwnerRecord {
    fn ser(&self, writer: &mut dyn ByteWrite) {
        self.entity.ser(writer);
        self.is_owner.ser(writer);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            entity: EntityId::de(reader)?,
            is_owner: bool::de(reader)?,
        })
    }
}
