//! Wave Composition
//!
//! Turns a threat level and an archetype table into a fixed wave plan.
//! Each wave independently picks an archetype by weight and scales it by
//! threat. Plans are composed once, at portal construction, and never
//! recomposed.

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::game::config::{validate_archetypes, ConfigError, GroupArchetype};
use crate::{MIN_INTER_SPAWN_DELAY_MS, MIN_INTER_WAVE_DELAY_MS};

/// Per-wave multipliers applied to every monster in the wave.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatModifiers {
    /// Scales base health
    pub health_multiplier: f64,
    /// Scales base speed
    pub speed_multiplier: f64,
}

impl Default for StatModifiers {
    fn default() -> Self {
        Self {
            health_multiplier: 1.0,
            speed_multiplier: 1.0,
        }
    }
}

/// One composed wave. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaveSpec {
    /// Archetype the wave was drawn from
    pub archetype: String,
    /// Monsters to spawn, always at least one
    pub enemy_count: u32,
    /// Multipliers for every monster in the wave
    pub modifiers: StatModifiers,
    /// Wait before this wave begins
    pub inter_wave_delay_ms: u64,
    /// Wait between consecutive spawns
    pub inter_spawn_delay_ms: u64,
}

/// Ordered waves for one portal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WavePlan {
    waves: Vec<WaveSpec>,
    total_monsters: u32,
}

impl WavePlan {
    /// Wave at `index`, if composed.
    pub fn get(&self, index: usize) -> Option<&WaveSpec> {
        self.waves.get(index)
    }

    /// All waves in order.
    pub fn waves(&self) -> &[WaveSpec] {
        &self.waves
    }

    /// Number of waves.
    pub fn total_waves(&self) -> usize {
        self.waves.len()
    }

    /// Sum of every wave's enemy count.
    pub fn total_monsters(&self) -> u32 {
        self.total_monsters
    }
}

/// Waves for a threat level: higher threat, strictly more waves.
#[inline]
pub fn total_waves(threat_level: u32) -> usize {
    1 + threat_level as usize
}

/// `ceil(base × (1 + floor(roll² × threat + 0.5)))`.
///
/// Squaring the roll biases results toward `base`, so high threat produces
/// occasional spikes rather than a uniform increase.
pub fn weighted_value(base: f64, threat_level: u32, roll: f64) -> f64 {
    let bonus = (roll * roll * threat_level as f64 + 0.5).floor();
    (base * (1.0 + bonus)).ceil()
}

/// Compose `1 + threat_level` waves from `archetypes`.
///
/// Fails on an empty table or one whose weights sum to zero, so a bad
/// table can never stall a portal mid-level.
pub fn compose_waves(
    threat_level: u32,
    archetypes: &[GroupArchetype],
    rng: &mut DeterministicRng,
) -> Result<WavePlan, ConfigError> {
    validate_archetypes(archetypes)?;

    let count = total_waves(threat_level);
    let mut waves = Vec::with_capacity(count);
    let mut total_monsters: u32 = 0;

    for index in 0..count {
        let archetype = rng
            .weighted_pick(archetypes)
            .ok_or(ConfigError::ZeroTotalWeight)?;

        let inter_wave_delay_ms = rng.between(MIN_INTER_WAVE_DELAY_MS, archetype.delay_ms);
        let enemy_count =
            weighted_value(archetype.monster_multiplier, threat_level, rng.next_frac()).max(1.0) as u32;
        let health_multiplier =
            weighted_value(archetype.health_multiplier, threat_level, rng.next_frac());
        let speed_multiplier =
            weighted_value(archetype.speed_multiplier, threat_level, rng.next_frac());
        let inter_spawn_delay_ms =
            rng.between(MIN_INTER_SPAWN_DELAY_MS, archetype.delay_ms / 25);

        let wave = WaveSpec {
            archetype: archetype.id.clone(),
            enemy_count,
            modifiers: StatModifiers {
                health_multiplier,
                speed_multiplier,
            },
            inter_wave_delay_ms,
            inter_spawn_delay_ms,
        };

        debug!(
            wave = index,
            threat = threat_level,
            archetype = %wave.archetype,
            monsters = wave.enemy_count,
            health = wave.modifiers.health_multiplier,
            speed = wave.modifiers.speed_multiplier,
            delay_ms = wave.inter_wave_delay_ms,
            spawn_delay_ms = wave.inter_spawn_delay_ms,
            "Composed wave"
        );

        total_monsters = total_monsters.saturating_add(wave.enemy_count);
        waves.push(wave);
    }

    Ok(WavePlan {
        waves,
        total_monsters,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::ArchetypeTable;
    use proptest::prelude::*;

    fn archetype(id: &str, weight: u32, delay_ms: u64) -> GroupArchetype {
        GroupArchetype {
            id: id.to_string(),
            weight,
            monster_multiplier: 2.0,
            health_multiplier: 1.0,
            speed_multiplier: 0.5,
            delay_ms,
        }
    }

    #[test]
    fn test_weighted_value_threat_zero_is_base() {
        for roll in [0.0, 0.3, 0.99] {
            assert_eq!(weighted_value(3.0, 0, roll), 3.0);
            assert_eq!(weighted_value(0.4, 0, roll), 1.0);
        }
    }

    #[test]
    fn test_weighted_value_scales_with_threat() {
        // roll² × threat + 0.5 = 0.81 × 10 + 0.5 = 8.6 → 8
        assert_eq!(weighted_value(2.0, 10, 0.9), 18.0);
        // Low rolls stay near base
        assert_eq!(weighted_value(2.0, 10, 0.1), 2.0);
    }

    #[test]
    fn test_single_archetype_always_picked() {
        let only = vec![archetype("only", 1, 3000)];
        let plan = compose_waves(5, &only, &mut DeterministicRng::new(9)).unwrap();

        assert!(plan.waves().iter().all(|w| w.archetype == "only"));
    }

    #[test]
    fn test_zero_weight_archetype_never_picked() {
        let table = vec![archetype("never", 0, 3000), archetype("always", 2, 3000)];
        let plan = compose_waves(20, &table, &mut DeterministicRng::new(10)).unwrap();

        assert!(plan.waves().iter().all(|w| w.archetype == "always"));
    }

    #[test]
    fn test_degenerate_tables_rejected() {
        let mut rng = DeterministicRng::new(1);

        assert!(matches!(compose_waves(1, &[], &mut rng), Err(ConfigError::EmptyArchetypes)));

        let zeros = vec![archetype("a", 0, 3000)];
        assert!(matches!(compose_waves(1, &zeros, &mut rng), Err(ConfigError::ZeroTotalWeight)));
    }

    #[test]
    fn test_composition_is_deterministic() {
        let table = ArchetypeTable::builtin().unwrap();
        let a = compose_waves(4, table.as_slice(), &mut DeterministicRng::new(42)).unwrap();
        let b = compose_waves(4, table.as_slice(), &mut DeterministicRng::new(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_delay_archetype_keeps_spawn_delay_near_floor() {
        // 4% of 4000 is 160, below the 200 floor; bounds are normalised
        let table = vec![archetype("quick", 1, 4000)];
        let plan = compose_waves(10, &table, &mut DeterministicRng::new(3)).unwrap();

        for wave in plan.waves() {
            assert!((160..=200).contains(&wave.inter_spawn_delay_ms));
        }
    }

    #[test]
    fn test_spawn_delay_is_four_percent_of_archetype_delay() {
        let table = vec![archetype("slow", 1, 10_000)];
        let plan = compose_waves(5, &table, &mut DeterministicRng::new(8)).unwrap();

        for wave in plan.waves() {
            assert!((200..=400).contains(&wave.inter_spawn_delay_ms));
        }
    }

    proptest! {
        #[test]
        fn prop_wave_counts(seed in any::<u64>(), threat in 0u32..40) {
            let table = ArchetypeTable::builtin().unwrap();
            let mut rng = DeterministicRng::new(seed);
            let plan = compose_waves(threat, table.as_slice(), &mut rng).unwrap();

            prop_assert_eq!(plan.total_waves(), 1 + threat as usize);
            prop_assert!(plan.waves().iter().all(|w| w.enemy_count >= 1));
            prop_assert!(plan.waves().iter().all(|w| w.modifiers.health_multiplier > 0.0));
            prop_assert!(plan.waves().iter().all(|w| w.modifiers.speed_multiplier > 0.0));

            let sum: u32 = plan.waves().iter().map(|w| w.enemy_count).sum();
            prop_assert_eq!(plan.total_monsters(), sum);

            for wave in plan.waves() {
                let archetype = table.get(&wave.archetype).unwrap();
                prop_assert!(wave.inter_wave_delay_ms >= MIN_INTER_WAVE_DELAY_MS);
                prop_assert!(wave.inter_wave_delay_ms <= archetype.delay_ms.max(MIN_INTER_WAVE_DELAY_MS));
            }
        }
    }
}
