use std::{any::type_name, time::Duration};

use crate::{
    codec::codec_registry::CodecRegistry,
    component::{
        change_tracker::ChangeTracker,
        replicate::Replicated,
        schema::{ComponentSchema, ReplicationDirection},
    },
    constants::MAX_COMPONENTS_PER_ENTITY,
    entity::error::EntityError,
    error::ConfigError,
    types::{ComponentId, EntityId, PeerId},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityState {
    Unspawned,
    Active,
    Despawned,
}

pub(crate) struct ComponentSlot {
    pub(crate) value: Box<dyn Replicated>,
    pub(crate) schema: ComponentSchema,
    pub(crate) tracker: ChangeTracker,
}

/// An ordered list of replicated components plus the identity, owner and
/// lifecycle state the director assigns. Component `i` is addressed on the
/// wire by bit `i` of the entity mask.
pub struct ReplicatedEntity {
    id: EntityId,
    owner: Option<PeerId>,
    state: EntityState,
    pub(crate) components: Vec<ComponentSlot>,
}

impl ReplicatedEntity {
    /// Builds an unspawned entity, validating every component's schema
    /// against the codec registry
    pub fn new(
        components: Vec<Box<dyn Replicated>>,
        codecs: &CodecRegistry,
    ) -> Result<Self, ConfigError> {
        if components.len() > MAX_COMPONENTS_PER_ENTITY {
            return Err(ConfigError::TooManyComponents {
                count: components.len(),
                max: MAX_COMPONENTS_PER_ENTITY,
            });
        }

        let mut slots = Vec::with_capacity(components.len());
        for value in components {
            let schema = value.schema()?;
            codecs.validate_schema(&schema)?;
            slots.push(ComponentSlot {
                value,
                schema,
                tracker: ChangeTracker::new(),
            });
        }

        Ok(Self {
            id: EntityId::UNASSIGNED,
            owner: None,
            state: EntityState::Unspawned,
            components: slots,
        })
    }

    // Identity & Lifecycle

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn owner(&self) -> Option<PeerId> {
        self.owner
    }

    pub fn is_owned_by(&self, peer: &PeerId) -> bool {
        self.owner.as_ref() == Some(peer)
    }

    pub fn set_owner(&mut self, owner: Option<PeerId>) {
        self.owner = owner;
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == EntityState::Active
    }

    /// Moves an unspawned or despawned entity into the Active state under `id`
    pub fn activate(&mut self, id: EntityId, owner: Option<PeerId>) -> Result<(), EntityError> {
        if self.state == EntityState::Active {
            return Err(EntityError::WrongState {
                action: "activate",
                state: self.state,
            });
        }
        self.id = id;
        self.owner = owner;
        self.state = EntityState::Active;
        Ok(())
    }

    /// Deactivates the entity, keeping its components as a reusable shell
    pub fn deactivate(&mut self) -> Result<(), EntityError> {
        if self.state != EntityState::Active {
            return Err(EntityError::WrongState {
                action: "deactivate",
                state: self.state,
            });
        }
        self.id = EntityId::UNASSIGNED;
        self.owner = None;
        self.state = EntityState::Despawned;
        Ok(())
    }

    // Components

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn component_at(&self, index: ComponentId) -> Option<&dyn Replicated> {
        self.components
            .get(usize::from(index))
            .map(|slot| slot.value.as_ref())
    }

    pub fn component_at_mut(&mut self, index: ComponentId) -> Option<&mut dyn Replicated> {
        match self.components.get_mut(usize::from(index)) {
            Some(slot) => Some(slot.value.as_mut()),
            None => None,
        }
    }

    pub fn schema(&self, index: ComponentId) -> Option<&ComponentSchema> {
        self.components
            .get(usize::from(index))
            .map(|slot| &slot.schema)
    }

    pub fn direction(&self, index: ComponentId) -> Option<ReplicationDirection> {
        self.schema(index).map(|schema| schema.direction())
    }

    pub fn tracker(&self, index: ComponentId) -> Option<&ChangeTracker> {
        self.components
            .get(usize::from(index))
            .map(|slot| &slot.tracker)
    }

    /// First component of type `C`
    pub fn component<C: Replicated>(&self) -> Option<&C> {
        self.components
            .iter()
            .find_map(|slot| slot.value.as_any().downcast_ref::<C>())
    }

    /// First component of type `C`, mutably. Changes made through this
    /// reference are not tracked; use [`ReplicatedEntity::mutate`] or mark
    /// the fields dirty afterwards.
    pub fn component_mut<C: Replicated>(&mut self) -> Option<&mut C> {
        self.components
            .iter_mut()
            .find_map(|slot| slot.value.as_any_mut().downcast_mut::<C>())
    }

    pub fn index_of<C: Replicated>(&self) -> Option<ComponentId> {
        self.components
            .iter()
            .position(|slot| slot.value.as_any().is::<C>())
            .map(|index| index as ComponentId)
    }

    // Change tracking

    pub fn mark_dirty(&mut self, component: ComponentId, bit: u8) -> Result<(), EntityError> {
        let slot = self.slot_mut(component)?;
        let count = slot.schema.field_count();
        if usize::from(bit) >= count {
            return Err(EntityError::FieldOutOfRange {
                component: slot.schema.name(),
                index: bit,
                count,
            });
        }
        slot.tracker.mark_dirty(bit);
        Ok(())
    }

    /// Runs `f` against component `component` (which must be a `C`) and
    /// marks field `bit` dirty
    pub fn mutate<C: Replicated, F: FnOnce(&mut C)>(
        &mut self,
        component: ComponentId,
        bit: u8,
        f: F,
    ) -> Result<(), EntityError> {
        let slot = self.slot_mut(component)?;
        let count = slot.schema.field_count();
        if usize::from(bit) >= count {
            return Err(EntityError::FieldOutOfRange {
                component: slot.schema.name(),
                index: bit,
                count,
            });
        }
        let actual = slot.schema.name();
        let Some(value) = slot.value.as_any_mut().downcast_mut::<C>() else {
            return Err(EntityError::ComponentTypeMismatch {
                index: component,
                expected: type_name::<C>(),
                actual,
            });
        };
        f(value);
        slot.tracker.mark_dirty(bit);
        Ok(())
    }

    pub fn set_min_interval(&mut self, min_interval: Duration) {
        for slot in &mut self.components {
            slot.tracker.set_min_interval(min_interval);
        }
    }

    pub fn has_pending_changes(&self) -> bool {
        self.components
            .iter()
            .any(|slot| slot.tracker.has_pending())
    }

    fn slot_mut(&mut self, component: ComponentId) -> Result<&mut ComponentSlot, EntityError> {
        let count = self.components.len();
        self.components
            .get_mut(usize::from(component))
            .ok_or(EntityError::ComponentOutOfRange {
                index: component,
                count,
            })
    }
}
