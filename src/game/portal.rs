//! Portal
//!
//! A spawn point: owns a generated path, the tower sites along it, a wave
//! plan and the state machine that walks through that plan.
//!
//! ```text
//! WAITING ──activate──▶ WAVE_COUNTDOWN ──deadline──▶ SPAWNING
//!                             ▲                         │
//!                             └──── wave complete ──────┤
//!                                                       │ last wave
//!                                                       ▼
//!                        EXPIRED ◀── no live monsters ── WAVE_COOLDOWN
//! ```
//!
//! BRANCHING is reserved for animated path growth and is never entered.

use std::fmt;

use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::core::clock::SimContext;
use crate::core::hash::StateHasher;
use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::config::{ConfigError, GroupArchetype, PortalConfig};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::monster::MonsterId;
use crate::game::path::{self, Path, TowerSite};
use crate::game::spawner::{SpawnCounters, Spawner, SpawnerEvent};
use crate::game::waves::{compose_waves, StatModifiers, WavePlan};

// =============================================================================
// PORTAL ID AND STATE
// =============================================================================

/// Portal identifier, ordered for deterministic iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortalId(pub u32);

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "portal#{}", self.0)
    }
}

/// Portal lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
#[derive(Default)]
pub enum PortalState {
    /// Created, waiting for activation
    #[default]
    Waiting = 0,
    /// Reserved for path growth; never entered
    Branching = 1,
    /// Waiting for the next wave's start
    WaveCountdown = 2,
    /// Spawning the current wave
    Spawning = 3,
    /// All waves spawned; waiting for the last monster to leave
    WaveCooldown = 4,
    /// Done
    Expired = 5,
}

impl PortalState {
    /// Counting down, spawning, or cooling down.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            PortalState::WaveCountdown | PortalState::Spawning | PortalState::WaveCooldown
        )
    }
}

// =============================================================================
// HOST
// =============================================================================

/// What a portal needs from the scene that hosts it.
pub trait PortalHost {
    /// Create a monster that follows `path` with `modifiers` applied.
    ///
    /// The portal reports each spawn as `SpawnerSpawned`; hosts attach the
    /// monster's one-shot kill handler with
    /// [`EventBus::once_for`](crate::game::events::EventBus::once_for)
    /// scoped to the returned id.
    fn spawn_monster(&mut self, portal: PortalId, path: &Path, modifiers: StatModifiers) -> MonsterId;

    /// How many of `portal`'s monsters are still alive.
    fn live_monsters(&self, portal: PortalId) -> usize;
}

// =============================================================================
// PORTAL
// =============================================================================

/// A portal and its wave state machine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Portal {
    id: PortalId,
    origin: Vec2,
    path: Path,
    tower_sites: Vec<TowerSite>,
    spawner: Spawner,
    state: PortalState,

    /// Events generated since the last `take_events`
    #[serde(skip)]
    pending_events: Vec<GameEvent>,
}

/// Build a portal at `origin`.
///
/// The portal draws from its own stream, forked from `rng`, so portals
/// never share random state.
pub fn create_portal(
    id: PortalId,
    origin: Vec2,
    config: PortalConfig,
    archetypes: &[GroupArchetype],
    rng: &mut DeterministicRng,
) -> Result<Portal, ConfigError> {
    let mut own = rng.fork();
    let generated = path::generate(origin, config.path_segments, &mut own)?;
    let plan = compose_waves(config.threat_level, archetypes, &mut own)?;

    debug!(
        portal = id.0,
        threat = config.threat_level,
        waves = plan.total_waves(),
        monsters = plan.total_monsters(),
        sites = generated.tower_sites.len(),
        "Created portal"
    );

    Ok(Portal {
        id,
        origin,
        path: generated.path,
        tower_sites: generated.tower_sites,
        spawner: Spawner::new(plan, config.threat_level),
        state: PortalState::Waiting,
        pending_events: Vec::new(),
    })
}

impl Portal {
    /// Identifier.
    pub fn id(&self) -> PortalId {
        self.id
    }

    /// Where the path was grown from.
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// The monster path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tower sites along the path.
    pub fn tower_sites(&self) -> &[TowerSite] {
        &self.tower_sites
    }

    /// Current state.
    pub fn state(&self) -> PortalState {
        self.state
    }

    /// Threat level.
    pub fn threat_level(&self) -> u32 {
        self.spawner.threat_level()
    }

    /// The composed waves.
    pub fn plan(&self) -> &WavePlan {
        self.spawner.plan()
    }

    /// Spawn counters.
    pub fn counters(&self) -> SpawnCounters {
        self.spawner.counters()
    }

    /// Pending deadline (spawn or wave start).
    pub fn next_event_at(&self) -> u64 {
        self.spawner.next_event_at()
    }

    /// WAITING → WAVE_COUNTDOWN, first wave starting after its delay.
    ///
    /// Returns false (and does nothing) from any other state.
    pub fn activate(&mut self, now_ms: u64, speed: f64) -> bool {
        if self.state != PortalState::Waiting {
            return false;
        }

        let delay = self.spawner.current_wave().inter_wave_delay_ms;
        self.spawner.schedule(now_ms, delay, speed);
        self.push_event(GameEvent::new(now_ms, GameEventData::PortalActivated { portal: self.id }));
        self.set_state(PortalState::WaveCountdown, now_ms);
        true
    }

    /// Advance the state machine by one frame.
    ///
    /// Frames before the current deadline change nothing.
    pub fn tick<H: PortalHost>(&mut self, ctx: &SimContext, host: &mut H) {
        match self.state {
            PortalState::Waiting | PortalState::Branching | PortalState::Expired => {}
            PortalState::WaveCountdown => {
                if self.spawner.is_due(ctx.now_ms) {
                    self.spawner.clear_deadline();
                    self.set_state(PortalState::Spawning, ctx.now_ms);
                }
            }
            PortalState::Spawning => self.tick_spawning(ctx, host),
            PortalState::WaveCooldown => {
                if host.live_monsters(self.id) == 0 {
                    info!(portal = self.id.0, "Portal expired");
                    self.set_state(PortalState::Expired, ctx.now_ms);
                    self.push_event(GameEvent::new(
                        ctx.now_ms,
                        GameEventData::PortalExpired { portal: self.id },
                    ));
                }
            }
        }
    }

    fn tick_spawning<H: PortalHost>(&mut self, ctx: &SimContext, host: &mut H) {
        let id = self.id;
        let path = &self.path;
        let outcome = self
            .spawner
            .spawn(ctx.now_ms, ctx.speed, |modifiers| host.spawn_monster(id, path, modifiers));

        let Some(outcome) = outcome else {
            return;
        };

        self.push_event(GameEvent::new(
            ctx.now_ms,
            GameEventData::SpawnerSpawned { portal: id, monster: outcome.actor, wave: outcome.wave },
        ));

        match outcome.boundary {
            None => {}
            Some(SpawnerEvent::WaveComplete { wave }) => {
                self.push_event(GameEvent::new(
                    ctx.now_ms,
                    GameEventData::SpawnerWaveComplete { portal: id, wave },
                ));
                self.set_state(PortalState::WaveCountdown, ctx.now_ms);
            }
            Some(SpawnerEvent::AllWavesComplete) => {
                self.push_event(GameEvent::new(
                    ctx.now_ms,
                    GameEventData::SpawnerAllWavesComplete { portal: id },
                ));
                self.set_state(PortalState::WaveCooldown, ctx.now_ms);
            }
        }
    }

    fn set_state(&mut self, new_state: PortalState, now_ms: u64) {
        let previous = self.state;
        self.state = new_state;
        debug!(portal = self.id.0, ?previous, ?new_state, "Portal state changed");
        self.push_event(GameEvent::state_changed(now_ms, self.id, new_state, previous));
    }

    /// Take events generated since the last call.
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }

    /// Add this portal's dynamic state to a hash.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        let counters = self.spawner.counters();
        hasher.update_u32(self.id.0);
        hasher.update_u8(self.state as u8);
        hasher.update_u32(self.spawner.threat_level());
        hasher.update_u32(counters.spawned_for_wave);
        hasher.update_u32(counters.total_spawned);
        hasher.update_u64(counters.current_wave as u64);
        hasher.update_u64(self.spawner.next_event_at());
        for point in self.path.points() {
            hasher.update_vec2(*point);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use crate::game::config::ArchetypeTable;
    use crate::game::events::EventKind;

    /// Host that records spawns and lets tests decide liveness.
    #[derive(Default)]
    struct TestHost {
        next: u32,
        alive: BTreeMap<MonsterId, bool>,
        modifiers: Vec<StatModifiers>,
        kill_on_spawn: bool,
    }

    impl TestHost {
        fn kill_all(&mut self) {
            for alive in self.alive.values_mut() {
                *alive = false;
            }
        }
    }

    impl PortalHost for TestHost {
        fn spawn_monster(&mut self, _portal: PortalId, path: &Path, modifiers: StatModifiers) -> MonsterId {
            assert!(path.segment_count() > 0);
            let id = MonsterId(self.next);
            self.next += 1;
            self.alive.insert(id, !self.kill_on_spawn);
            self.modifiers.push(modifiers);
            id
        }

        fn live_monsters(&self, _portal: PortalId) -> usize {
            self.alive.values().filter(|a| **a).count()
        }
    }

    fn portal(threat: u32, seed: u64) -> Portal {
        let table = ArchetypeTable::builtin().unwrap();
        let config = PortalConfig { path_segments: 6, threat_level: threat };
        create_portal(PortalId(0), Vec2::new(512.0, 384.0), config, table.as_slice(), &mut DeterministicRng::new(seed))
            .unwrap()
    }

    fn count(events: &[GameEvent], kind: EventKind) -> usize {
        events.iter().filter(|e| e.kind() == kind).count()
    }

    #[test]
    fn test_create_portal_shape() {
        let p = portal(2, 1);

        assert_eq!(p.state(), PortalState::Waiting);
        assert_eq!(p.plan().total_waves(), 3);
        assert_eq!(p.path().segment_count(), 6);
        assert_eq!(p.tower_sites().len(), 5);
        assert_eq!(p.path().end(), p.origin());
    }

    #[test]
    fn test_create_portal_rejects_empty_archetypes() {
        let result = create_portal(
            PortalId(0),
            Vec2::ZERO,
            PortalConfig::default(),
            &[],
            &mut DeterministicRng::new(1),
        );
        assert!(matches!(result, Err(ConfigError::EmptyArchetypes)));
    }

    #[test]
    fn test_waiting_ignores_ticks() {
        let mut p = portal(0, 2);
        let mut host = TestHost::default();

        p.tick(&SimContext::new(1_000_000, 16, 1.0), &mut host);
        assert_eq!(p.state(), PortalState::Waiting);
        assert!(p.take_events().is_empty());
    }

    #[test]
    fn test_activate_only_from_waiting() {
        let mut p = portal(0, 3);
        let delay = p.plan().get(0).unwrap().inter_wave_delay_ms;

        assert!(p.activate(100, 1.0));
        assert_eq!(p.state(), PortalState::WaveCountdown);
        assert_eq!(p.next_event_at(), 100 + delay);

        let events = p.take_events();
        assert_eq!(count(&events, EventKind::PortalActivated), 1);
        assert_eq!(
            events.last().map(|e| e.data.clone()),
            Some(GameEventData::PortalStateChanged {
                portal: PortalId(0),
                new_state: PortalState::WaveCountdown,
                previous_state: PortalState::Waiting,
            })
        );

        assert!(!p.activate(200, 1.0));
        assert!(p.take_events().is_empty());
    }

    #[test]
    fn test_countdown_to_spawning_exactly_once() {
        let mut p = portal(1, 4);
        let mut host = TestHost::default();
        p.activate(0, 1.0);
        p.take_events();

        let deadline = p.next_event_at();

        // At the deadline: not yet
        p.tick(&SimContext::new(deadline, 16, 1.0), &mut host);
        assert_eq!(p.state(), PortalState::WaveCountdown);

        p.tick(&SimContext::new(deadline + 1, 16, 1.0), &mut host);
        assert_eq!(p.state(), PortalState::Spawning);
        assert_eq!(p.next_event_at(), 0);

        let events = p.take_events();
        assert_eq!(count(&events, EventKind::PortalStateChanged), 1);
        assert_eq!(host.next, 0, "the transition frame spawns nothing");
    }

    #[test]
    fn test_ticks_before_deadline_are_idempotent() {
        let mut p = portal(3, 5);
        let mut host = TestHost::default();
        p.activate(0, 1.0);
        p.tick(&SimContext::new(p.next_event_at() + 1, 16, 1.0), &mut host);

        // First spawn arms the inter-spawn deadline
        let now = 10_000;
        p.tick(&SimContext::new(now, 16, 1.0), &mut host);
        p.take_events();

        let state = p.state();
        let counters = p.counters();
        let deadline = p.next_event_at();

        for t in now..=deadline {
            p.tick(&SimContext::new(t, 1, 1.0), &mut host);
            assert_eq!(p.state(), state);
            assert_eq!(p.counters(), counters);
        }
        assert!(p.take_events().is_empty());
    }

    #[test]
    fn test_wave_complete_returns_to_countdown() {
        let mut p = portal(4, 6);
        let mut host = TestHost::default();
        let first_count = p.plan().get(0).unwrap().enemy_count;

        p.activate(0, 1.0);
        let mut now = p.next_event_at() + 1;
        p.tick(&SimContext::new(now, 16, 1.0), &mut host);
        assert_eq!(p.state(), PortalState::Spawning);

        let mut events = Vec::new();
        while p.state() == PortalState::Spawning {
            now = now.max(p.next_event_at()) + 1;
            p.tick(&SimContext::new(now, 16, 1.0), &mut host);
            events.extend(p.take_events());
        }

        assert_eq!(p.state(), PortalState::WaveCountdown);
        assert_eq!(count(&events, EventKind::SpawnerSpawned), first_count as usize);
        assert_eq!(count(&events, EventKind::SpawnerWaveComplete), 1);

        let counters = p.counters();
        assert_eq!(counters.current_wave, 1);
        assert_eq!(counters.spawned_for_wave, 0);
        assert_eq!(counters.total_spawned, first_count);

        // Every spawn of wave 0 used wave 0's modifiers
        let expected = p.plan().get(0).unwrap().modifiers;
        assert!(host.modifiers.iter().all(|m| *m == expected));
    }

    #[test]
    fn test_cooldown_waits_for_live_monsters() {
        let mut p = portal(0, 7);
        let mut host = TestHost::default();
        let mut now = 0;
        p.activate(now, 1.0);

        while p.state() != PortalState::WaveCooldown {
            now = now.max(p.next_event_at()) + 1;
            p.tick(&SimContext::new(now, 16, 1.0), &mut host);
        }
        p.take_events();

        // Monsters still alive: polling, no transition
        for _ in 0..10 {
            now += 1000;
            p.tick(&SimContext::new(now, 16, 1.0), &mut host);
            assert_eq!(p.state(), PortalState::WaveCooldown);
        }

        host.kill_all();
        p.tick(&SimContext::new(now + 16, 16, 1.0), &mut host);
        assert_eq!(p.state(), PortalState::Expired);

        // Terminal
        p.tick(&SimContext::new(now + 32, 16, 1.0), &mut host);
        let events = p.take_events();
        assert_eq!(count(&events, EventKind::PortalExpired), 1);
        assert_eq!(count(&events, EventKind::PortalStateChanged), 1);
    }

    #[test]
    fn test_threat_zero_end_to_end() {
        let mut p = portal(0, 8);
        let mut host = TestHost { kill_on_spawn: true, ..TestHost::default() };
        let enemy_count = p.plan().get(0).unwrap().enemy_count;
        assert_eq!(p.plan().total_waves(), 1);

        p.activate(0, 1.0);
        let mut now = 1_000_000;
        let mut all_events = Vec::new();

        // Countdown → spawning
        p.tick(&SimContext::new(now, 16, 1.0), &mut host);
        assert_eq!(p.state(), PortalState::Spawning);

        let mut spawn_ticks = 0;
        while p.state() == PortalState::Spawning {
            now += 1_000_000;
            p.tick(&SimContext::new(now, 16, 1.0), &mut host);
            spawn_ticks += 1;
        }
        assert_eq!(spawn_ticks, enemy_count);
        assert_eq!(p.state(), PortalState::WaveCooldown);

        now += 1_000_000;
        p.tick(&SimContext::new(now, 16, 1.0), &mut host);
        assert_eq!(p.state(), PortalState::Expired);

        all_events.extend(p.take_events());
        assert_eq!(p.counters().total_spawned, enemy_count);
        assert_eq!(count(&all_events, EventKind::SpawnerAllWavesComplete), 1);
        assert_eq!(count(&all_events, EventKind::SpawnerWaveComplete), 0);
        assert_eq!(count(&all_events, EventKind::PortalExpired), 1);
    }

    #[test]
    fn test_branching_is_inert() {
        let mut p = portal(0, 9);
        let mut host = TestHost::default();
        p.state = PortalState::Branching;

        p.tick(&SimContext::new(u64::MAX / 4, 16, 1.0), &mut host);
        assert_eq!(p.state(), PortalState::Branching);
        assert!(p.take_events().is_empty());
    }
}
