use skein_serde::{ByteReader, Serde};

use crate::{
    codec::codec_registry::CodecRegistry,
    component::{dirty_mask::DirtyMask, replicate::Replicated, schema::ReplicationDirection},
    entity::{error::EntityError, replicated_entity::ReplicatedEntity},
    types::ComponentId,
};

/// Who produced a payload being applied, which decides what it may touch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyPolicy {
    /// Client applying server state. When the local peer owns the entity,
    /// client-authoritative components with unsent local writes keep their
    /// local values.
    FromServer { is_owner: bool },
    /// Server applying the owning client's upstream writes. Any
    /// server-authoritative component in the payload rejects all of it.
    FromOwner,
}

/// Fields that were actually written into the entity by an apply
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppliedMask {
    fields: Vec<(ComponentId, DirtyMask)>,
}

impl AppliedMask {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn components(&self) -> DirtyMask {
        let mut mask = DirtyMask::EMPTY;
        for (component, _) in &self.fields {
            mask.set_bit(*component);
        }
        mask
    }

    pub fn fields(&self, component: ComponentId) -> DirtyMask {
        self.fields
            .iter()
            .find(|(index, _)| *index == component)
            .map(|(_, mask)| *mask)
            .unwrap_or(DirtyMask::EMPTY)
    }
}

struct Staged {
    index: usize,
    value: Box<dyn Replicated>,
    mask: DirtyMask,
    accept: bool,
}

impl ReplicatedEntity {
    /// Applies a full or delta payload. Every announced field is decoded into
    /// staged copies first; components are only replaced once the whole
    /// payload has decoded, so a failure leaves the entity untouched.
    pub fn apply(
        &mut self,
        codecs: &CodecRegistry,
        payload: &[u8],
        policy: ApplyPolicy,
    ) -> Result<AppliedMask, EntityError> {
        let mut reader = ByteReader::new(payload);
        let entity_mask = DirtyMask::de(&mut reader)?;
        if entity_mask.width() > self.components.len() {
            return Err(EntityError::ComponentOutOfRange {
                index: (entity_mask.width() - 1) as ComponentId,
                count: self.components.len(),
            });
        }

        let mut staged = Vec::with_capacity(entity_mask.count() as usize);
        for component in entity_mask.iter() {
            let slot = &self.components[usize::from(component)];
            let name = slot.schema.name();

            let field_mask = DirtyMask::de(&mut reader)?;
            let count = slot.schema.field_count();
            if field_mask.width() > count {
                return Err(EntityError::FieldOutOfRange {
                    component: name,
                    index: (field_mask.width() - 1) as u8,
                    count,
                });
            }

            let direction = slot.schema.direction();
            let accept = match policy {
                ApplyPolicy::FromOwner => {
                    if direction == ReplicationDirection::ServerAuthoritative {
                        return Err(EntityError::DirectionViolation { component: name });
                    }
                    true
                }
                ApplyPolicy::FromServer { is_owner } => {
                    !(is_owner
                        && direction == ReplicationDirection::ClientAuthoritative
                        && slot.tracker.has_pending())
                }
            };

            // rejected components are still decoded to stay aligned
            let mut value = slot.value.copy_to_box();
            for field in field_mask.iter() {
                value
                    .decode_field(field, codecs, &mut reader)
                    .map_err(|source| EntityError::Codec {
                        component: name,
                        source,
                    })?;
            }

            staged.push(Staged {
                index: usize::from(component),
                value,
                mask: field_mask,
                accept,
            });
        }

        if reader.has_remaining() {
            return Err(EntityError::TrailingBytes {
                count: reader.remaining(),
            });
        }

        let mut applied = AppliedMask::default();
        for Staged {
            index,
            value,
            mask,
            accept,
        } in staged
        {
            if !accept {
                continue;
            }
            let slot = &mut self.components[index];
            slot.value = value;
            if policy == ApplyPolicy::FromOwner {
                slot.tracker.mark_owner_written(mask);
            }
            applied.fields.push((index as ComponentId, mask));
        }

        Ok(applied)
    }
}
