//! Spawner
//!
//! Owns "when and how many" for a wave plan; the owner supplies "what" as a
//! creation closure. The spawner keeps the counters, the spawn deadline and
//! the wave cursor, and reports wave boundaries back to its owner.

use serde::{Serialize, Deserialize};

use crate::core::gate::TimedGate;
use crate::game::waves::{StatModifiers, WavePlan, WaveSpec};

/// Spawn progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnCounters {
    /// Spawned in the current wave; reset at each new wave
    pub spawned_for_wave: u32,
    /// Spawned across all waves
    pub total_spawned: u32,
    /// Index of the wave being spawned or counted down to
    pub current_wave: usize,
}

/// Wave boundary reached by a spawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnerEvent {
    /// `wave` finished; the cursor moved to `wave + 1`
    WaveComplete {
        /// Index of the wave that just finished
        wave: usize,
    },
    /// The final wave finished
    AllWavesComplete,
}

/// Result of a successful [`Spawner::spawn`].
#[derive(Debug)]
pub struct SpawnOutcome<A> {
    /// What the creation closure produced
    pub actor: A,
    /// Wave the actor belongs to
    pub wave: usize,
    /// Set when this spawn completed a wave
    pub boundary: Option<SpawnerEvent>,
}

/// Wave-plan driven spawner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Spawner {
    plan: WavePlan,
    threat_level: u32,
    counters: SpawnCounters,
    next_event: TimedGate,
}

impl Spawner {
    /// Start at wave 0 with nothing spawned and no deadline.
    pub fn new(plan: WavePlan, threat_level: u32) -> Self {
        Self {
            plan,
            threat_level,
            counters: SpawnCounters::default(),
            next_event: TimedGate::default(),
        }
    }

    /// The composed plan.
    pub fn plan(&self) -> &WavePlan {
        &self.plan
    }

    /// Threat level the plan was composed for.
    pub fn threat_level(&self) -> u32 {
        self.threat_level
    }

    /// Current counters.
    pub fn counters(&self) -> SpawnCounters {
        self.counters
    }

    /// Deadline for the next spawn or wave start.
    pub fn next_event_at(&self) -> u64 {
        self.next_event.ready_at()
    }

    /// The wave under the cursor.
    ///
    /// The cursor only ever advances to a wave that exists, so an index
    /// past the plan is a scheduling bug.
    pub fn current_wave(&self) -> &WaveSpec {
        match self.plan.get(self.counters.current_wave) {
            Some(wave) => wave,
            None => unreachable!(
                "wave cursor {} beyond plan of {} waves",
                self.counters.current_wave,
                self.plan.total_waves()
            ),
        }
    }

    /// Strictly past the stored deadline.
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.next_event.is_ready(now_ms)
    }

    /// Set the deadline `delay_ms` (speed-scaled) from now.
    pub fn schedule(&mut self, now_ms: u64, delay_ms: u64, speed: f64) {
        self.next_event.arm(now_ms, delay_ms as f64, speed);
    }

    /// Drop the deadline so the next frame is due.
    pub fn clear_deadline(&mut self) {
        self.next_event.clear();
    }

    /// Every wave fully spawned.
    pub fn is_exhausted(&self) -> bool {
        self.counters.current_wave + 1 >= self.plan.total_waves()
            && self.counters.spawned_for_wave >= self.current_wave().enemy_count
    }

    /// Spawn one actor if the deadline has passed.
    ///
    /// Within a wave the next spawn is scheduled `inter_spawn_delay_ms`
    /// out. Completing a wave moves the cursor and schedules the next
    /// wave's start; completing the last wave leaves the deadline as is.
    pub fn spawn<A, F>(&mut self, now_ms: u64, speed: f64, create: F) -> Option<SpawnOutcome<A>>
    where
        F: FnOnce(StatModifiers) -> A,
    {
        if !self.is_due(now_ms) || self.is_exhausted() {
            return None;
        }

        let wave_index = self.counters.current_wave;
        let (modifiers, enemy_count, spawn_delay) = {
            let wave = self.current_wave();
            (wave.modifiers, wave.enemy_count, wave.inter_spawn_delay_ms)
        };

        let actor = create(modifiers);
        self.counters.total_spawned += 1;
        self.counters.spawned_for_wave += 1;

        let boundary = if self.counters.spawned_for_wave < enemy_count {
            self.schedule(now_ms, spawn_delay, speed);
            None
        } else if wave_index + 1 < self.plan.total_waves() {
            let next = wave_index + 1;
            let delay = match self.plan.get(next) {
                Some(wave) => wave.inter_wave_delay_ms,
                None => unreachable!("next wave {} missing from plan", next),
            };
            self.counters.current_wave = next;
            self.counters.spawned_for_wave = 0;
            self.schedule(now_ms, delay, speed);
            Some(SpawnerEvent::WaveComplete { wave: wave_index })
        } else {
            Some(SpawnerEvent::AllWavesComplete)
        };

        Some(SpawnOutcome {
            actor,
            wave: wave_index,
            boundary,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
