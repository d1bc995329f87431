//! Game Events
//!
//! Typed lifecycle events produced by the simulation, and the synchronous
//! bus that delivers them to collaborators (UI, effects, scene logic).
//!
//! Subscriptions are owned by an entity. Tearing the entity down releases
//! every subscription it owns or is scoped to, so listeners never outlive
//! what they listen to.

use serde::{Serialize, Deserialize};

use crate::game::monster::MonsterId;
use crate::game::portal::{PortalId, PortalState};
use crate::game::weapon::TowerId;

/// Event kind, one per [`GameEventData`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Level countdown began
    CountdownStarted,
    /// Level countdown finished (or was skipped)
    CountdownEnded,
    /// Portal left WAITING
    PortalActivated,
    /// Any portal transition
    PortalStateChanged,
    /// Portal reached EXPIRED
    PortalExpired,
    /// Spawner produced a monster
    SpawnerSpawned,
    /// Spawner finished a wave with more to come
    SpawnerWaveComplete,
    /// Spawner finished its last wave
    SpawnerAllWavesComplete,
    /// Monster killed
    MonsterKilled,
    /// Monster reached the end of its path
    MonsterReachedCore,
    /// Tower built on a site
    TowerBuilt,
    /// Tower fired at a monster
    TowerFired,
    /// Exit portal opened
    ExitPortalActivated,
}

impl EventKind {
    /// Stable wire name.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::CountdownStarted => "level:countdown-start",
            EventKind::CountdownEnded => "level:countdown-end",
            EventKind::PortalActivated => "portal:activated",
            EventKind::PortalStateChanged => "portal:state-changed",
            EventKind::PortalExpired => "portal:expired",
            EventKind::SpawnerSpawned => "spawner:spawned",
            EventKind::SpawnerWaveComplete => "spawner:wavecomplete",
            EventKind::SpawnerAllWavesComplete => "spawner:allwavescomplete",
            EventKind::MonsterKilled => "monster:killed",
            EventKind::MonsterReachedCore => "monster:reached-core",
            EventKind::TowerBuilt => "tower:built",
            EventKind::TowerFired => "tower:fired",
            EventKind::ExitPortalActivated => "level:exit",
        }
    }
}

/// Anything that can own or be the subject of a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// The level itself
    Level,
    /// A portal
    Portal(PortalId),
    /// A monster
    Monster(MonsterId),
    /// A tower
    Tower(TowerId),
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEventData {
    /// Level countdown began
    CountdownStarted {
        /// When portals will activate
        ends_at_ms: u64,
    },

    /// Level countdown finished
    CountdownEnded,

    /// Portal left WAITING
    PortalActivated {
        portal: PortalId,
    },

    /// Portal transition
    PortalStateChanged {
        portal: PortalId,
        new_state: PortalState,
        previous_state: PortalState,
    },

    /// Portal reached EXPIRED
    PortalExpired {
        portal: PortalId,
    },

    /// Monster spawned
    SpawnerSpawned {
        portal: PortalId,
        monster: MonsterId,
        wave: usize,
    },

    /// Wave finished, more to come
    SpawnerWaveComplete {
        portal: PortalId,
        wave: usize,
    },

    /// Last wave finished
    SpawnerAllWavesComplete {
        portal: PortalId,
    },

    /// Monster killed
    MonsterKilled {
        monster: MonsterId,
        portal: PortalId,
        materials: u32,
    },

    /// Monster reached the exit
    MonsterReachedCore {
        monster: MonsterId,
        portal: PortalId,
        /// Whether it arrived alive (damaging) or dead (restoring)
        alive: bool,
        /// Exit stability after the arrival
        stability: f64,
    },

    /// Tower built
    TowerBuilt {
        tower: TowerId,
        portal: PortalId,
    },

    /// Tower fired
    TowerFired {
        tower: TowerId,
        monster: MonsterId,
        damage: f64,
    },

    /// Exit portal opened
    ExitPortalActivated {
        stability: f64,
    },
}

/// A game event with its timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Simulation clock when the event occurred
    pub now_ms: u64,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(now_ms: u64, data: GameEventData) -> Self {
        Self { now_ms, data }
    }

    /// The event's kind.
    pub fn kind(&self) -> EventKind {
        match &self.data {
            GameEventData::CountdownStarted { .. } => EventKind::CountdownStarted,
            GameEventData::CountdownEnded => EventKind::CountdownEnded,
            GameEventData::PortalActivated { .. } => EventKind::PortalActivated,
            GameEventData::PortalStateChanged { .. } => EventKind::PortalStateChanged,
            GameEventData::PortalExpired { .. } => EventKind::PortalExpired,
            GameEventData::SpawnerSpawned { .. } => EventKind::SpawnerSpawned,
            GameEventData::SpawnerWaveComplete { .. } => EventKind::SpawnerWaveComplete,
            GameEventData::SpawnerAllWavesComplete { .. } => EventKind::SpawnerAllWavesComplete,
            GameEventData::MonsterKilled { .. } => EventKind::MonsterKilled,
            GameEventData::MonsterReachedCore { .. } => EventKind::MonsterReachedCore,
            GameEventData::TowerBuilt { .. } => EventKind::TowerBuilt,
            GameEventData::TowerFired { .. } => EventKind::TowerFired,
            GameEventData::ExitPortalActivated { .. } => EventKind::ExitPortalActivated,
        }
    }

    /// The portal this event concerns, if any.
    pub fn portal(&self) -> Option<PortalId> {
        match &self.data {
            GameEventData::PortalActivated { portal }
            | GameEventData::PortalStateChanged { portal, .. }
            | GameEventData::PortalExpired { portal }
            | GameEventData::SpawnerSpawned { portal, .. }
            | GameEventData::SpawnerWaveComplete { portal, .. }
            | GameEventData::SpawnerAllWavesComplete { portal }
            | GameEventData::MonsterKilled { portal, .. }
            | GameEventData::MonsterReachedCore { portal, .. }
            | GameEventData::TowerBuilt { portal, .. } => Some(*portal),
            _ => None,
        }
    }

    /// The monster this event concerns, if any.
    pub fn monster(&self) -> Option<MonsterId> {
        match &self.data {
            GameEventData::SpawnerSpawned { monster, .. }
            | GameEventData::MonsterKilled { monster, .. }
            | GameEventData::MonsterReachedCore { monster, .. }
            | GameEventData::TowerFired { monster, .. } => Some(*monster),
            _ => None,
        }
    }

    /// Whether `entity` is a subject of this event.
    pub fn involves(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Level => true,
            EntityRef::Portal(id) => self.portal() == Some(id),
            EntityRef::Monster(id) => self.monster() == Some(id),
            EntityRef::Tower(id) => matches!(
                &self.data,
                GameEventData::TowerBuilt { tower, .. } | GameEventData::TowerFired { tower, .. }
                    if *tower == id
            ),
        }
    }

    // Constructors used by the simulation

    pub(crate) fn state_changed(
        now_ms: u64,
        portal: PortalId,
        new_state: PortalState,
        previous_state: PortalState,
    ) -> Self {
        Self::new(now_ms, GameEventData::PortalStateChanged { portal, new_state, previous_state })
    }

    pub(crate) fn monster_killed(now_ms: u64, monster: MonsterId, portal: PortalId, materials: u32) -> Self {
        Self::new(now_ms, GameEventData::MonsterKilled { monster, portal, materials })
    }
}

// =============================================================================
// EVENT BUS
// =============================================================================

/// Handle returned by [`EventBus`] subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&GameEvent)>;

struct Subscription {
    id: SubscriptionId,
    owner: EntityRef,
    kind: EventKind,
    scope: Option<EntityRef>,
    once: bool,
    handler: Handler,
}

/// Synchronous, single-threaded event dispatcher.
///
/// Handlers run in subscription order, inside [`EventBus::dispatch`].
#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl EventBus {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribe(
        &mut self,
        owner: EntityRef,
        kind: EventKind,
        scope: Option<EntityRef>,
        once: bool,
        handler: Handler,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, owner, kind, scope, once, handler });
        id
    }

    /// Call `handler` for every event of `kind`.
    pub fn on<F>(&mut self, owner: EntityRef, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + 'static,
    {
        self.subscribe(owner, kind, None, false, Box::new(handler))
    }

    /// Call `handler` for the next event of `kind` only.
    pub fn once<F>(&mut self, owner: EntityRef, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + 'static,
    {
        self.subscribe(owner, kind, None, true, Box::new(handler))
    }

    /// Call `handler` for the next event of `kind` involving `scope`.
    pub fn once_for<F>(
        &mut self,
        owner: EntityRef,
        kind: EventKind,
        scope: EntityRef,
        handler: F,
    ) -> SubscriptionId
    where
        F: FnMut(&GameEvent) + 'static,
    {
        self.subscribe(owner, kind, Some(scope), true, Box::new(handler))
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn off(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    /// Teardown: drop every subscription owned by or scoped to `entity`.
    /// Returns how many were removed.
    pub fn release(&mut self, entity: EntityRef) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|s| s.owner != entity && s.scope != Some(entity));
        before - self.subscriptions.len()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// No live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Deliver `events` in order. One-shot handlers are removed after firing.
    pub fn dispatch(&mut self, events: &[GameEvent]) {
        for event in events {
            let kind = event.kind();
            self.subscriptions.retain_mut(|sub| {
                if sub.kind != kind {
                    return true;
                }
                if let Some(scope) = sub.scope {
                    if !event.involves(scope) {
                        return true;
                    }
                }
                (sub.handler)(event);
                !sub.once
            });
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
