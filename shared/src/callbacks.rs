use crate::{entity::replicated_entity::ReplicatedEntity, types::EntityId};

type EntityCallback = Box<dyn FnMut(EntityId, &ReplicatedEntity)>;
type SceneCallback = Box<dyn FnMut(&str)>;

/// Application hooks for entity lifecycle events. Subscribers run
/// synchronously on the tick thread, in registration order.
#[derive(Default)]
pub struct LifecycleCallbacks {
    spawned: Vec<EntityCallback>,
    despawned: Vec<EntityCallback>,
    owner_changed: Vec<EntityCallback>,
    scene_changed: Vec<SceneCallback>,
}

impl LifecycleCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    // Subscribe

    pub fn on_spawned<F: FnMut(EntityId, &ReplicatedEntity) + 'static>(&mut self, callback: F) {
        self.spawned.push(Box::new(callback));
    }

    pub fn on_despawned<F: FnMut(EntityId, &ReplicatedEntity) + 'static>(&mut self, callback: F) {
        self.despawned.push(Box::new(callback));
    }

    pub fn on_owner_changed<F: FnMut(EntityId, &ReplicatedEntity) + 'static>(
        &mut self,
        callback: F,
    ) {
        self.owner_changed.push(Box::new(callback));
    }

    pub fn on_scene_changed<F: FnMut(&str) + 'static>(&mut self, callback: F) {
        self.scene_changed.push(Box::new(callback));
    }

    // Fire

    pub fn spawned(&mut self, id: EntityId, entity: &ReplicatedEntity) {
        for callback in &mut self.spawned {
            callback(id, entity);
        }
    }

    pub fn despawned(&mut self, id: EntityId, entity: &ReplicatedEntity) {
        for callback in &mut self.despawned {
            callback(id, entity);
        }
    }

    pub fn owner_changed(&mut self, id: EntityId, entity: &ReplicatedEntity) {
        for callback in &mut self.owner_changed {
            callback(id, entity);
        }
    }

    pub fn scene_changed(&mut self, scene: &str) {
        for callback in &mut self.scene_changed {
            callback(scene);
        }
    }
}
