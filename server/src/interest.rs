use skein_shared::{EntityId, PeerId};

use crate::server_entity::ServerEntity;

/// Decides whether a ready peer should observe an entity
pub trait InterestPolicy {
    fn is_interested(&self, peer: PeerId, id: EntityId, entity: &ServerEntity) -> bool;
}

/// Every ready peer observes every entity
#[derive(Clone, Copy, Debug, Default)]
pub struct ObserveAll;

impl InterestPolicy for ObserveAll {
    fn is_interested(&self, _peer: PeerId, _id: EntityId, _entity: &ServerEntity) -> bool {
        true
    }
}

impl<F> InterestPolicy for F
where
    F: Fn(PeerId, EntityId, &ServerEntity) -> bool,
{
    fn is_interested(&self, peer: PeerId, id: EntityId, entity: &ServerEntity) -> bool {
        self(peer, id, entity)
    }
}
