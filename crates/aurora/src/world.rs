//! Component I: the world mirror. Mutated only by handler callbacks in
//! [`crate::session`]; never touched directly from user code.

use aurora_protocol::packets::{AttributeValue, Vec3};
use std::collections::HashMap;

/// Local player data, populated from `StartGame` and kept current by
/// `MovePlayer`/`ChangeDimension`/`Respawn`/`SetPlayerGameType` (§3).
#[derive(Debug, Clone, Default)]
pub struct PlayerState {
    pub entity_id: i64,
    pub runtime_entity_id: u64,
    pub position: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub gamemode: i32,
    pub dimension: i32,
    pub spawn_position: (i32, i32, i32),
    pub world_name: String,
    pub seed: i64,
    pub difficulty: i32,
    pub world_gamemode: i32,
    attributes: HashMap<String, AttributeValue>,
}

impl PlayerState {
    /// Replaces any attribute whose name appears in `list`; others are left
    /// untouched.
    pub fn update_attributes(&mut self, list: Vec<AttributeValue>) {
        for attribute in list {
            self.attributes.insert(attribute.name.clone(), attribute);
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Current health, defaulting to 20 (a full vanilla health bar) when the
    /// `minecraft:health` attribute hasn't arrived yet.
    pub fn health(&self) -> f32 {
        self.attribute("minecraft:health").map(|a| a.current).unwrap_or(20.0)
    }

    /// Current movement speed, defaulting to vanilla walk speed (0.1) when
    /// the `minecraft:movement` attribute is absent.
    pub fn movement_speed(&self) -> f32 {
        self.attribute("minecraft:movement").map(|a| a.current).unwrap_or(0.1)
    }
}

/// A remote entity mirrored from `AddPlayer`/`AddEntity` and kept current by
/// movement/metadata packets (§3).
#[derive(Debug, Clone)]
pub struct TrackedEntity {
    pub runtime_id: u64,
    pub unique_id: i64,
    pub entity_type: String,
    pub position: Vec3,
    pub motion: Vec3,
    pub pitch: f32,
    pub yaw: f32,
    pub head_yaw: f32,
    pub metadata: HashMap<String, String>,
    pub player: Option<PlayerIdentity>,
}

#[derive(Debug, Clone)]
pub struct PlayerIdentity {
    pub username: String,
    pub uuid: uuid::Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct EntityTracker {
    entities: HashMap<u64, TrackedEntity>,
}

impl EntityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&mut self, entity: TrackedEntity) {
        self.entities.insert(entity.runtime_id, entity);
    }

    pub fn add_entity(&mut self, entity: TrackedEntity) {
        self.entities.insert(entity.runtime_id, entity);
    }

    /// Linear scan is acceptable here (§4.I) — `RemoveEntity` only carries
    /// the secondary `unique_id` key, not the primary `runtime_id`.
    pub fn remove_by_unique_id(&mut self, unique_id: i64) -> Option<TrackedEntity> {
        let runtime_id = self
            .entities
            .values()
            .find(|entity| entity.unique_id == unique_id)
            .map(|entity| entity.runtime_id)?;
        self.entities.remove(&runtime_id)
    }

    pub fn update_position(&mut self, runtime_id: u64, position: Vec3, pitch: f32, yaw: f32, head_yaw: f32) {
        if let Some(entity) = self.entities.get_mut(&runtime_id) {
            entity.position = position;
            entity.pitch = pitch;
            entity.yaw = yaw;
            entity.head_yaw = head_yaw;
        }
    }

    pub fn update_motion(&mut self, runtime_id: u64, motion: Vec3) {
        if let Some(entity) = self.entities.get_mut(&runtime_id) {
            entity.motion = motion;
        }
    }

    pub fn update_metadata(&mut self, runtime_id: u64, key: String, value: String) {
        if let Some(entity) = self.entities.get_mut(&runtime_id) {
            entity.metadata.insert(key, value);
        }
    }

    pub fn get(&self, runtime_id: u64) -> Option<&TrackedEntity> {
        self.entities.get(&runtime_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity with minimum squared distance to `position`, or `None` if no
    /// entities are tracked.
    pub fn nearest(&self, position: Vec3) -> Option<&TrackedEntity> {
        self.entities.values().min_by(|a, b| {
            squared_distance(a.position, position)
                .partial_cmp(&squared_distance(b.position, position))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

fn squared_distance(a: Vec3, b: Vec3) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    dx * dx + dy * dy + dz * dz
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(runtime_id: u64, unique_id: i64, position: Vec3) -> TrackedEntity {
        TrackedEntity {
            runtime_id,
            unique_id,
            entity_type: "minecraft:zombie".to_string(),
            position,
            motion: Vec3::default(),
            pitch: 0.0,
            yaw: 0.0,
            head_yaw: 0.0,
            metadata: HashMap::new(),
            player: None,
        }
    }

    #[test]
    fn update_attributes_leaves_others_untouched() {
        let mut player = PlayerState::default();
        player.update_attributes(vec![AttributeValue {
            name: "minecraft:health".to_string(),
            min: 0.0,
            max: 20.0,
            current: 14.0,
            default: 20.0,
        }]);
        assert_eq!(player.health(), 14.0);
        assert_eq!(player.movement_speed(), 0.1);
    }

    #[test]
    fn remove_by_unique_id_finds_secondary_key() {
        let mut tracker = EntityTracker::new();
        tracker.add_entity(entity(1, 100, Vec3::default()));
        tracker.add_entity(entity(2, 200, Vec3::default()));
        let removed = tracker.remove_by_unique_id(100).unwrap();
        assert_eq!(removed.runtime_id, 1);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.remove_by_unique_id(999).is_none());
    }

    #[test]
    fn nearest_returns_minimum_squared_distance() {
        let mut tracker = EntityTracker::new();
        tracker.add_entity(entity(1, 1, Vec3 { x: 10.0, y: 0.0, z: 0.0 }));
        tracker.add_entity(entity(2, 2, Vec3 { x: 1.0, y: 0.0, z: 0.0 }));
        let nearest = tracker.nearest(Vec3::default()).unwrap();
        assert_eq!(nearest.runtime_id, 2);
    }

    #[test]
    fn nearest_on_empty_tracker_is_none() {
        let tracker = EntityTracker::new();
        assert!(tracker.nearest(Vec3::default()).is_none());
    }
}
