//! Level State
//!
//! The scene aggregate: portals, the monsters they spawned, the towers on
//! their sites, the exit portal and the player's banked progress.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::gate::TimedGate;
use crate::core::hash::{compute_state_hash, StateHash};
use crate::core::rng::DeterministicRng;
use crate::game::config::{ConfigError, LevelConfig, PortalConfig, WeaponConfig};
use crate::game::events::{EntityRef, GameEvent, GameEventData};
use crate::game::exit::ExitPortal;
use crate::game::monster::{MonsterId, MonsterRoster};
use crate::game::portal::{create_portal, Portal, PortalId, PortalState};
use crate::game::snapshot::PlayerSnapshot;
use crate::game::weapon::{Tower, TowerId, TowerKind};

// =============================================================================
// LEVEL PHASE
// =============================================================================

/// Level progression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum LevelPhase {
    /// Created; the countdown starts on the first tick
    #[default]
    Pending = 0,
    /// Counting down to portal activation
    Countdown = 1,
    /// Portals are active
    Running = 2,
    /// Every portal expired and the exit opened
    ExitOpen = 3,
}

/// Entities removed by [`LevelState::remove_portal`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Teardown {
    /// The removed portal
    pub portal: PortalId,
    /// Its monsters
    pub monsters: Vec<MonsterId>,
    /// Towers on its path
    pub towers: Vec<TowerId>,
}

impl Teardown {
    /// Everything whose subscriptions should be released.
    pub fn entities(&self) -> Vec<EntityRef> {
        std::iter::once(EntityRef::Portal(self.portal))
            .chain(self.monsters.iter().map(|m| EntityRef::Monster(*m)))
            .chain(self.towers.iter().map(|t| EntityRef::Tower(*t)))
            .collect()
    }
}

// =============================================================================
// LEVEL STATE
// =============================================================================

/// Complete level state.
#[derive(Clone, Debug)]
pub struct LevelState {
    /// Seed the level was built from
    pub seed: u64,

    /// Clock of the latest tick
    pub now_ms: u64,

    /// Current phase
    pub phase: LevelPhase,

    /// Portals (BTreeMap for deterministic iteration)
    pub portals: BTreeMap<PortalId, Portal>,

    /// Every monster in play
    pub roster: MonsterRoster,

    /// Tower sites, built or not
    pub towers: BTreeMap<TowerId, Tower>,

    /// The exit portal
    pub exit: ExitPortal,

    /// Player progress carried into this level
    pub player: PlayerSnapshot,

    /// Deadline for portal activation
    pub countdown: TimedGate,

    countdown_ms: u64,
    weapon: WeaponConfig,

    /// Events generated this tick (cleared each tick)
    pending_events: Vec<GameEvent>,
}

impl LevelState {
    /// Build a level: exit at the origin, `portal_count` portals around it,
    /// and an unbuilt tower on every site their paths produced.
    pub fn new(config: &LevelConfig, player: PlayerSnapshot) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut rng = DeterministicRng::new(config.seed);
        let mut portals = BTreeMap::new();
        let mut towers = BTreeMap::new();
        let mut next_tower = 0;

        for index in 0..config.portal_count {
            let id = PortalId(index as u32);
            let spread = rng.between(0, config.threat_spread as u64) as u32;
            let portal_config = PortalConfig {
                path_segments: config.path_segments,
                threat_level: config.base_threat + player.level + spread,
            };

            let portal = create_portal(
                id,
                config.origin,
                portal_config,
                config.archetypes.as_slice(),
                &mut rng,
            )?;

            for site in portal.tower_sites() {
                let tower_id = TowerId(next_tower);
                next_tower += 1;
                towers.insert(tower_id, Tower::new(tower_id, id, *site));
            }

            portals.insert(id, portal);
        }

        info!(
            seed = config.seed,
            portals = portals.len(),
            towers = towers.len(),
            level = player.level,
            "Level created"
        );

        Ok(Self {
            seed: config.seed,
            now_ms: 0,
            phase: LevelPhase::Pending,
            portals,
            roster: MonsterRoster::new(config.walker.clone()),
            towers,
            exit: ExitPortal::new(config.origin),
            player,
            countdown: TimedGate::default(),
            countdown_ms: config.countdown_ms,
            weapon: config.cannon.clone(),
            pending_events: Vec::new(),
        })
    }

    /// Length of the opening countdown.
    pub fn countdown_ms(&self) -> u64 {
        self.countdown_ms
    }

    /// Get a portal by ID.
    pub fn portal(&self, id: PortalId) -> Option<&Portal> {
        self.portals.get(&id)
    }

    /// Every portal has reached EXPIRED.
    pub fn all_portals_expired(&self) -> bool {
        self.portals.values().all(|p| p.state() == PortalState::Expired)
    }

    /// End the countdown on the next tick.
    pub fn skip_countdown(&mut self) {
        if self.phase == LevelPhase::Countdown {
            self.countdown.clear();
        }
    }

    /// Kill a monster outright. Returns true if it was alive.
    ///
    /// Takes effect immediately, so the next portal tick already counts
    /// the monster as dead.
    pub fn kill_monster(&mut self, id: MonsterId) -> bool {
        self.strike(id, None)
    }

    /// Damage a monster. Returns true if the hit killed it.
    pub fn damage_monster(&mut self, id: MonsterId, amount: f64) -> bool {
        self.strike(id, Some(amount))
    }

    fn strike(&mut self, id: MonsterId, damage: Option<f64>) -> bool {
        let Some(walker) = self.roster.get_mut(id) else {
            return false;
        };
        let Some(portal) = self.portals.get(&walker.portal) else {
            return false;
        };

        let killed = match damage {
            Some(amount) => walker.take_damage(amount, portal.path()),
            None => walker.kill(portal.path()),
        };

        if killed {
            self.player.materials += walker.materials;
            debug!(monster = id.0, portal = walker.portal.0, "Monster killed");
            self.pending_events
                .push(GameEvent::monster_killed(self.now_ms, id, walker.portal, walker.materials));
        }
        killed
    }

    /// Build a cannon on a tower site. Returns false for an unknown or
    /// already built site.
    pub fn build_tower(&mut self, id: TowerId) -> Result<bool, ConfigError> {
        let Some(tower) = self.towers.get_mut(&id) else {
            return Ok(false);
        };
        if !tower.build(TowerKind::Cannon, &self.weapon)? {
            return Ok(false);
        }
        let portal = tower.portal;
        self.push_event(GameEvent::new(self.now_ms, GameEventData::TowerBuilt { tower: id, portal }));
        Ok(true)
    }

    /// Tear a portal down with its monsters and towers.
    pub fn remove_portal(&mut self, id: PortalId) -> Option<Teardown> {
        self.portals.remove(&id)?;
        let monsters = self.roster.remove_portal(id);

        let towers: Vec<TowerId> = self
            .towers
            .values()
            .filter(|t| t.portal == id)
            .map(|t| t.id)
            .collect();
        for tower in &towers {
            self.towers.remove(tower);
        }

        info!(portal = id.0, monsters = monsters.len(), towers = towers.len(), "Portal removed");
        Some(Teardown { portal: id, monsters, towers })
    }

    /// Player snapshot to carry into the next level.
    pub fn next_snapshot(&self) -> PlayerSnapshot {
        self.player.next_level(self.player.materials, self.player.position)
    }

    /// Compute deterministic hash of current state.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.now_ms, self.seed, |hasher| {
            hasher.update_u8(self.phase as u8);
            hasher.update_u64(self.countdown.ready_at());

            // Sorted order (BTreeMap guarantees this)
            for portal in self.portals.values() {
                portal.hash_into(hasher);
            }

            self.roster.hash_into(hasher);

            for tower in self.towers.values() {
                tower.hash_into(hasher);
            }

            self.exit.hash_into(hasher);
            hasher.update_u32(self.player.materials);
        })
    }

    /// Take and clear pending events.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    /// Move every portal's pending events onto the level queue.
    pub(crate) fn collect_portal_events(&mut self) {
        for portal in self.portals.values_mut() {
            self.pending_events.extend(portal.take_events());
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::SimContext;
    use crate::game::events::EventKind;
    use crate::game::portal::PortalHost;

    fn level(seed: u64) -> LevelState {
        let mut config = LevelConfig::builtin().unwrap();
        config.seed = seed;
        config.portal_count = 3;
        config.path_segments = 5;
        LevelState::new(&config, PlayerSnapshot::default()).unwrap()
    }

    #[test]
    fn test_level_layout() {
        let level = level(1);

        assert_eq!(level.portals.len(), 3);
        assert_eq!(level.towers.len(), 3 * 4);
        assert_eq!(level.phase, LevelPhase::Pending);
        assert!(level.portals.values().all(|p| p.state() == PortalState::Waiting));
        assert!(level.portals.values().all(|p| p.path().end() == level.exit.position));
    }

    #[test]
    fn test_threat_within_spread() {
        let mut config = LevelConfig::builtin().unwrap();
        config.base_threat = 2;
        config.threat_spread = 3;
        let player = PlayerSnapshot { level: 1, ..PlayerSnapshot::default() };
        let level = LevelState::new(&config, player).unwrap();

        for portal in level.portals.values() {
            assert!((3..=6).contains(&portal.threat_level()));
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = LevelConfig::builtin().unwrap();
        config.cannon.rate_of_fire = 0.0;
        assert!(LevelState::new(&config, PlayerSnapshot::default()).is_err());
    }

    #[test]
    fn test_same_seed_same_hash() {
        assert_eq!(level(9).compute_hash(), level(9).compute_hash());
        assert_ne!(level(9).compute_hash(), level(10).compute_hash());
    }

    #[test]
    fn test_kill_monster_credits_once() {
        let mut level = level(2);
        let portal_id = PortalId(0);
        let path = level.portals[&portal_id].path().clone();
        let monster = level.roster.spawn_monster(portal_id, &path, Default::default());
        let materials = level.roster.get(monster).unwrap().materials;

        assert!(level.kill_monster(monster));
        assert!(!level.kill_monster(monster));
        assert_eq!(level.player.materials, materials);

        let events = level.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::MonsterKilled);
        assert_eq!(level.roster.live_monsters(portal_id), 0);
    }

    #[test]
    fn test_build_tower() {
        let mut level = level(3);
        let id = *level.towers.keys().next().unwrap();

        assert!(level.build_tower(id).unwrap());
        assert!(!level.build_tower(id).unwrap());
        assert!(!level.build_tower(TowerId(9999)).unwrap());
        assert_eq!(level.take_events().len(), 1);
    }

    #[test]
    fn test_remove_portal_tears_down_children() {
        let mut level = level(4);
        let portal_id = PortalId(1);
        let path = level.portals[&portal_id].path().clone();
        level.roster.spawn_monster(portal_id, &path, Default::default());

        let teardown = level.remove_portal(portal_id).unwrap();
        assert_eq!(teardown.monsters.len(), 1);
        assert_eq!(teardown.towers.len(), 4);
        assert_eq!(teardown.entities().len(), 6);
        assert!(level.portal(portal_id).is_none());
        assert!(level.towers.values().all(|t| t.portal != portal_id));
        assert!(level.remove_portal(portal_id).is_none());
    }

    #[test]
    fn test_skip_countdown_only_while_counting() {
        let mut level = level(5);
        level.skip_countdown();
        assert_eq!(level.countdown.ready_at(), 0);

        crate::game::tick::tick(&mut level, SimContext::new(0, 16, 1.0));
        assert_eq!(level.phase, LevelPhase::Countdown);
        assert!(level.countdown.ready_at() > 0);

        level.skip_countdown();
        assert_eq!(level.countdown.ready_at(), 0);
    }
}
