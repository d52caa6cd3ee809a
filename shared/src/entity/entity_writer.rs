use std::time::Instant;

use skein_serde::{ByteWriter, Serde};

use crate::{
    codec::codec_registry::CodecRegistry,
    component::{dirty_mask::DirtyMask, schema::ReplicationDirection},
    entity::{error::EntityError, replicated_entity::ReplicatedEntity},
};

/// The two payloads one serialization pass produces. `None` means nothing
/// on that channel changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityPayloads {
    /// Sent only to the owning peer
    pub owner: Option<Vec<u8>>,
    /// Sent to every other interested peer
    pub observer: Option<Vec<u8>>,
}

impl EntityPayloads {
    pub fn is_empty(&self) -> bool {
        self.owner.is_none() && self.observer.is_none()
    }

    pub fn for_peer(&self, is_owner: bool) -> Option<&Vec<u8>> {
        if is_owner {
            self.owner.as_ref()
        } else {
            self.observer.as_ref()
        }
    }
}

impl ReplicatedEntity {
    /// Serializes the entity for both channels.
    ///
    /// With `force_all` every field of every component is written and the
    /// trackers are left untouched. Otherwise only components whose tracker
    /// reports dirty at `now` are written, and those trackers are cleared.
    pub fn serialize(
        &mut self,
        codecs: &CodecRegistry,
        force_all: bool,
        now: Instant,
    ) -> Result<EntityPayloads, EntityError> {
        if force_all {
            let full = self.serialize_full(codecs)?;
            return Ok(EntityPayloads {
                owner: Some(full.clone()),
                observer: Some(full),
            });
        }

        let mut owner_masks = Vec::with_capacity(self.components.len());
        let mut observer_masks = Vec::with_capacity(self.components.len());
        for slot in &self.components {
            if !slot.tracker.is_dirty(now) {
                owner_masks.push(DirtyMask::EMPTY);
                observer_masks.push(DirtyMask::EMPTY);
                continue;
            }
            let dirty = slot.tracker.dirty();
            let owner_mask = match slot.schema.direction() {
                ReplicationDirection::ServerAuthoritative => dirty,
                // the owner only hears back about its own writes
                ReplicationDirection::ClientAuthoritative => dirty & slot.tracker.owner_written(),
            };
            owner_masks.push(owner_mask);
            observer_masks.push(dirty);
        }

        let payloads = EntityPayloads {
            owner: self.write_delta(codecs, &owner_masks)?,
            observer: self.write_delta(codecs, &observer_masks)?,
        };

        for (slot, mask) in self.components.iter_mut().zip(&observer_masks) {
            if !mask.is_clear() {
                slot.tracker.clear(now);
            }
        }

        Ok(payloads)
    }

    /// Every field of every component, regardless of dirty state. Used for
    /// spawn records. An entity without components yields a segment holding
    /// only an empty entity mask.
    pub fn serialize_full(&self, codecs: &CodecRegistry) -> Result<Vec<u8>, EntityError> {
        let masks: Vec<DirtyMask> = self
            .components
            .iter()
            .map(|slot| slot.schema.all_fields())
            .collect();
        let entity_mask = DirtyMask::all(self.components.len());
        self.write_segment(codecs, entity_mask, &masks)
    }

    /// Client-side upstream pass: the dirty fields of client-authoritative
    /// components. Local changes to server-authoritative components are
    /// never sent and are discarded here.
    pub fn serialize_upstream(
        &mut self,
        codecs: &CodecRegistry,
        now: Instant,
    ) -> Result<Option<Vec<u8>>, EntityError> {
        let mut masks = Vec::with_capacity(self.components.len());
        for slot in &mut self.components {
            match slot.schema.direction() {
                ReplicationDirection::ClientAuthoritative if slot.tracker.is_dirty(now) => {
                    masks.push(slot.tracker.dirty());
                }
                ReplicationDirection::ClientAuthoritative => masks.push(DirtyMask::EMPTY),
                ReplicationDirection::ServerAuthoritative => {
                    if slot.tracker.has_pending() {
                        slot.tracker.clear(now);
                    }
                    masks.push(DirtyMask::EMPTY);
                }
            }
        }

        let payload = self.write_delta(codecs, &masks)?;

        for (slot, mask) in self.components.iter_mut().zip(&masks) {
            if !mask.is_clear() {
                slot.tracker.clear(now);
            }
        }

        Ok(payload)
    }

    /// Drops every pending local change without sending it. The resend
    /// interval keeps running from the last real sync.
    pub fn discard_changes(&mut self) {
        for slot in &mut self.components {
            slot.tracker.discard();
        }
    }

    fn write_delta(
        &self,
        codecs: &CodecRegistry,
        masks: &[DirtyMask],
    ) -> Result<Option<Vec<u8>>, EntityError> {
        let mut entity_mask = DirtyMask::EMPTY;
        for (index, mask) in masks.iter().enumerate() {
            if !mask.is_clear() {
                entity_mask.set_bit(index as u8);
            }
        }
        if entity_mask.is_clear() {
            return Ok(None);
        }
        self.write_segment(codecs, entity_mask, masks).map(Some)
    }

    fn write_segment(
        &self,
        codecs: &CodecRegistry,
        entity_mask: DirtyMask,
        masks: &[DirtyMask],
    ) -> Result<Vec<u8>, EntityError> {
        let mut writer = ByteWriter::new();
        entity_mask.ser(&mut writer);

        for component in entity_mask.iter() {
            let slot = &self.components[usize::from(component)];
            let field_mask = masks[usize::from(component)];
            field_mask.ser(&mut writer);
            for field in field_mask.iter() {
                slot.value
                    .encode_field(field, codecs, &mut writer)
                    .map_err(|source| EntityError::Codec {
                        component: slot.schema.name(),
                        source,
                    })?;
            }
        }

        Ok(writer.to_bytes())
    }
}
