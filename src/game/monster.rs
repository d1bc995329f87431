//! Monsters
//!
//! Walkers follow their portal's path toward the exit. A killed walker stops
//! counting as alive at once, then drifts the rest of the way to the exit
//! before leaving the simulation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::clock::SimContext;
use crate::core::hash::StateHasher;
use crate::core::vec2::Vec2;
use crate::game::config::EnemyType;
use crate::game::path::Path;
use crate::game::portal::{PortalHost, PortalId};
use crate::game::waves::StatModifiers;
use crate::DEATH_DRIFT_MS;

/// Monster identifier, ordered for deterministic iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonsterId(pub u32);

impl fmt::Display for MonsterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "monster#{}", self.0)
    }
}

/// Whether a monster still counts toward its portal's liveness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MonsterState {
    /// Walking and targetable
    Alive = 0,
    /// Killed; drifting to the exit
    Dead = 1,
}

/// A path-following monster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Walker {
    /// Identifier
    pub id: MonsterId,
    /// Portal that spawned it
    pub portal: PortalId,
    /// Current state
    pub state: MonsterState,
    /// Remaining hit points
    pub health: f64,
    /// Units per second while alive
    pub speed: f64,
    /// Distance travelled along the path
    pub distance: f64,
    /// Current position
    pub position: Vec2,
    /// Exit stability swing on arrival
    pub stability_damage: f64,
    /// Materials awarded on kill
    pub materials: u32,
    /// Speed used for the post-death drift
    drift_speed: f64,
}

impl Walker {
    /// Place a new walker at the start of `path`.
    pub fn new(id: MonsterId, portal: PortalId, path: &Path, base: &EnemyType, modifiers: StatModifiers) -> Self {
        Self {
            id,
            portal,
            state: MonsterState::Alive,
            health: base.health * modifiers.health_multiplier,
            speed: base.speed * modifiers.speed_multiplier,
            distance: 0.0,
            position: path.start(),
            stability_damage: base.damage,
            materials: base.materials,
            drift_speed: 0.0,
        }
    }

    /// Alive and targetable.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state == MonsterState::Alive
    }

    /// Move along `path` for this frame. Returns true once the end is reached.
    pub fn advance(&mut self, ctx: &SimContext, path: &Path) -> bool {
        let speed = match self.state {
            MonsterState::Alive => self.speed,
            MonsterState::Dead => self.drift_speed,
        };
        self.distance += speed * ctx.scaled_delta_secs();
        self.position = path.position_at_distance(self.distance);
        self.distance >= path.length()
    }

    /// Apply damage. Returns true if this hit killed the walker.
    pub fn take_damage(&mut self, amount: f64, path: &Path) -> bool {
        if !self.is_alive() {
            return false;
        }
        let before = self.health;
        self.health -= amount;
        if amount >= before {
            return self.kill(path);
        }
        false
    }

    /// Kill the walker. Returns true only the first time, so the kill
    /// notification is emitted exactly once.
    pub fn kill(&mut self, path: &Path) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.state = MonsterState::Dead;
        self.health = 0.0;
        let remaining = (path.length() - self.distance).max(0.0);
        self.drift_speed = remaining / (DEATH_DRIFT_MS as f64 / 1000.0);
        true
    }

    fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id.0);
        hasher.update_u32(self.portal.0);
        hasher.update_u8(self.state as u8);
        hasher.update_f64(self.health);
        hasher.update_f64(self.distance);
        hasher.update_vec2(self.position);
    }
}

/// All monsters in a level, keyed by id.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MonsterRoster {
    monsters: BTreeMap<MonsterId, Walker>,
    next_id: u32,
    enemy: EnemyType,
}

impl MonsterRoster {
    /// Empty roster spawning `enemy` walkers.
    pub fn new(enemy: EnemyType) -> Self {
        Self {
            monsters: BTreeMap::new(),
            next_id: 0,
            enemy,
        }
    }

    /// Look up a monster.
    pub fn get(&self, id: MonsterId) -> Option<&Walker> {
        self.monsters.get(&id)
    }

    /// Look up a monster mutably.
    pub fn get_mut(&mut self, id: MonsterId) -> Option<&mut Walker> {
        self.monsters.get_mut(&id)
    }

    /// Monsters in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Walker> {
        self.monsters.values()
    }

    /// Monsters in id order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Walker> {
        self.monsters.values_mut()
    }

    /// Number of monsters in the simulation, dead drifters included.
    pub fn len(&self) -> usize {
        self.monsters.len()
    }

    /// No monsters at all.
    pub fn is_empty(&self) -> bool {
        self.monsters.is_empty()
    }

    /// Take a monster out of the simulation.
    pub fn remove(&mut self, id: MonsterId) -> Option<Walker> {
        self.monsters.remove(&id)
    }

    /// Remove every monster belonging to `portal`, returning their ids.
    pub fn remove_portal(&mut self, portal: PortalId) -> Vec<MonsterId> {
        let ids: Vec<MonsterId> = self
            .monsters
            .values()
            .filter(|m| m.portal == portal)
            .map(|m| m.id)
            .collect();
        for id in &ids {
            self.monsters.remove(id);
        }
        ids
    }

    /// Nearest alive monster within `range` of `from`. Ties go to the lower id.
    pub fn nearest_alive(&self, from: Vec2, range: f64) -> Option<MonsterId> {
        let mut best: Option<(MonsterId, f64)> = None;
        for monster in self.monsters.values().filter(|m| m.is_alive()) {
            let distance = from.distance(monster.position);
            if distance > range {
                continue;
            }
            match best {
                Some((_, d)) if d <= distance => {}
                _ => best = Some((monster.id, distance)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Add this roster to a hash.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.next_id);
        for monster in self.monsters.values() {
            monster.hash_into(hasher);
        }
    }
}

impl PortalHost for MonsterRoster {
    fn spawn_monster(&mut self, portal: PortalId, path: &Path, modifiers: StatModifiers) -> MonsterId {
        let id = MonsterId(self.next_id);
        self.next_id += 1;
        self.monsters.insert(id, Walker::new(id, portal, path, &self.enemy, modifiers));
        id
    }

    fn live_monsters(&self, portal: PortalId) -> usize {
        self.monsters
            .values()
            .filter(|m| m.portal == portal && m.is_alive())
            .count()
    }
}

// =============================================================================
// TESTS
// =============================================================================
