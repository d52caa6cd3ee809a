use skein_shared::{Pose, ReplicatedEntity, SpawnOrigin};

/// An entity in the director's table, together with how peers should
/// instantiate it
pub struct ServerEntity {
    pub entity: ReplicatedEntity,
    pub origin: SpawnOrigin,
    pub pose: Option<Pose>,
}

impl ServerEntity {
    pub fn new(entity: ReplicatedEntity, origin: SpawnOrigin, pose: Option<Pose>) -> Self {
        Self {
            entity,
            origin,
            pose,
        }
    }
}
