//! Portal Overview
//!
//! Headless model behind the portal overview widget. Built once from the
//! level, then kept current purely from events.

use std::collections::BTreeMap;
use std::fmt;

use crate::game::events::{GameEvent, GameEventData};
use crate::game::portal::{PortalId, PortalState};
use crate::game::state::LevelState;

/// What the overview shows for one portal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortalStatus {
    /// Last reported state
    pub state: PortalState,
    /// Wave being spawned or counted down to
    pub wave: usize,
    /// Waves in the plan
    pub total_waves: usize,
    /// Monsters spawned so far
    pub spawned: u32,
    /// Monsters in the plan
    pub total_monsters: u32,
    /// Portal threat level
    pub threat_level: u32,
}

impl PortalStatus {
    fn icon(&self) -> &'static str {
        match self.state {
            PortalState::Waiting => "..",
            PortalState::Branching => "<>",
            PortalState::WaveCountdown => ">>",
            PortalState::Spawning => "**",
            PortalState::WaveCooldown => "--",
            PortalState::Expired => "xx",
        }
    }
}

/// Status of every portal in a level.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortalOverview {
    portals: BTreeMap<PortalId, PortalStatus>,
}

impl PortalOverview {
    /// Seed from the level's current portals.
    pub fn from_level(level: &LevelState) -> Self {
        let portals = level
            .portals
            .values()
            .map(|portal| {
                let counters = portal.counters();
                let status = PortalStatus {
                    state: portal.state(),
                    wave: counters.current_wave,
                    total_waves: portal.plan().total_waves(),
                    spawned: counters.total_spawned,
                    total_monsters: portal.plan().total_monsters(),
                    threat_level: portal.threat_level(),
                };
                (portal.id(), status)
            })
            .collect();

        Self { portals }
    }

    /// Status of one portal.
    pub fn get(&self, id: PortalId) -> Option<&PortalStatus> {
        self.portals.get(&id)
    }

    /// Number of portals shown.
    pub fn len(&self) -> usize {
        self.portals.len()
    }

    /// Whether no portals are shown.
    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }

    /// Apply one event. Events for unknown portals are ignored.
    pub fn apply(&mut self, event: &GameEvent) {
        match event.data {
            GameEventData::PortalStateChanged { portal, new_state, .. } => {
                if let Some(status) = self.portals.get_mut(&portal) {
                    status.state = new_state;
                }
            }
            GameEventData::SpawnerSpawned { portal, wave, .. } => {
                if let Some(status) = self.portals.get_mut(&portal) {
                    status.wave = wave;
                    status.spawned += 1;
                }
            }
            GameEventData::SpawnerWaveComplete { portal, wave } => {
                if let Some(status) = self.portals.get_mut(&portal) {
                    status.wave = wave + 1;
                }
            }
            GameEventData::PortalExpired { portal } => {
                if let Some(status) = self.portals.get_mut(&portal) {
                    status.state = PortalState::Expired;
                }
            }
            _ => {}
        }
    }

    /// Drop a portal that was torn down.
    pub fn remove(&mut self, id: PortalId) -> Option<PortalStatus> {
        self.portals.remove(&id)
    }

    /// Portals counting down, spawning, or cooling down.
    pub fn active_count(&self) -> usize {
        self.portals.values().filter(|s| s.state.is_active()).count()
    }

    /// Whether every portal shown has expired.
    pub fn all_expired(&self) -> bool {
        self.portals.values().all(|s| s.state == PortalState::Expired)
    }
}

impl fmt::Display for PortalOverview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, status) in &self.portals {
            writeln!(
                f,
                "{} {:<10} threat {:>2}  wave {}/{}  spawned {}/{}",
                status.icon(),
                id.to_string(),
                status.threat_level,
                (status.wave + 1).min(status.total_waves),
                status.total_waves,
                status.spawned,
                status.total_monsters,
            )?;
        }
        Ok(())
    }
}
