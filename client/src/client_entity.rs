use skein_shared::{Pose, ReplicatedEntity, SpawnOrigin};

/// A mirrored entity and whether this peer owns it
pub struct ClientEntity {
    pub entity: ReplicatedEntity,
    pub origin: SpawnOrigin,
    pub pose: Option<Pose>,
    pub is_owner: bool,
}
