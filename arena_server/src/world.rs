//! World state: the authoritative entity map.
//!
//! Entities enter through [`WorldState::create`] on connect and leave through
//! [`WorldState::remove`] on disconnect; nothing else adds or drops them.

use std::collections::HashMap;

use arena_shared::{
    config::Rules,
    entity::{Entity, EntityId},
    net::Snapshot,
};

#[derive(Debug, Default)]
pub struct WorldState {
    entities: HashMap<EntityId, Entity>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new entity. Returns `false` if the id is already present.
    pub fn create(&mut self, id: EntityId, name: Option<&str>, rules: &Rules) -> bool {
        if self.entities.contains_key(&id) {
            return false;
        }
        self.entities.insert(id, Entity::spawn(id, name, rules));
        true
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Mutable access to two distinct entities at once.
    pub fn pair_mut(&mut self, a: EntityId, b: EntityId) -> Option<(&mut Entity, &mut Entity)> {
        if a == b {
            return None;
        }
        let mut first = None;
        let mut second = None;
        for (id, entity) in self.entities.iter_mut() {
            if *id == a {
                first = Some(entity);
            } else if *id == b {
                second = Some(entity);
            }
        }
        first.zip(second)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    /// Full copy of the world, ordered by id.
    pub fn snapshot(&self, tick: u32) -> Snapshot {
        let mut entities: Vec<Entity> = self.entities.values().cloned().collect();
        entities.sort_by_key(|e| e.id);
        Snapshot { tick, entities }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_guarded_against_duplicates() {
        let rules = Rules::default();
        let mut world = WorldState::new();
        assert!(world.create(EntityId(1), Some("a"), &rules));
        world.get_mut(EntityId(1)).unwrap().add_score(3);
        assert!(!world.create(EntityId(1), Some("b"), &rules));
        let e = world.get(EntityId(1)).unwrap();
        assert_eq!(e.name, "a");
        assert_eq!(e.score(), 3);
    }

    #[test]
    fn remove_missing_is_none() {
        let mut world = WorldState::new();
        assert!(world.remove(EntityId(9)).is_none());
    }

    #[test]
    fn pair_mut_rejects_same_and_missing() {
        let rules = Rules::default();
        let mut world = WorldState::new();
        world.create(EntityId(1), None, &rules);
        world.create(EntityId(2), None, &rules);
        assert!(world.pair_mut(EntityId(1), EntityId(1)).is_none());
        assert!(world.pair_mut(EntityId(1), EntityId(3)).is_none());
        let (a, b) = world.pair_mut(EntityId(2), EntityId(1)).unwrap();
        assert_eq!((a.id, b.id), (EntityId(2), EntityId(1)));
    }

    #[test]
    fn snapshot_is_sorted() {
        let rules = Rules::default();
        let mut world = WorldState::new();
        for id in [5, 2, 9] {
            world.create(EntityId(id), None, &rules);
        }
        let snap = world.snapshot(4);
        assert_eq!(snap.tick, 4);
        let ids: Vec<u32> = snap.entities.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }
}
