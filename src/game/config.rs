//! Level Configuration
//!
//! Static data the simulation reads but never writes: wave archetypes,
//! enemy base stats, weapon stats and per-level settings. Everything is
//! validated once at construction so nothing at tick time can fail.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::rng::Weighted;
use crate::core::vec2::Vec2;
use crate::{ARENA_HEIGHT, ARENA_WIDTH, MIN_INTER_WAVE_DELAY_MS};

/// Bundled archetype table.
const BUILTIN_ARCHETYPES: &str = include_str!("../../data/archetypes.json");

// =============================================================================
// ERRORS
// =============================================================================

/// Configuration rejected at construction time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No archetypes to compose waves from.
    #[error("archetype list is empty")]
    EmptyArchetypes,
    /// Every archetype has weight zero, so none can ever be picked.
    #[error("archetype weights sum to zero")]
    ZeroTotalWeight,
    /// A numeric field that must be strictly positive is not.
    #[error("{field} must be positive, got {value}")]
    NonPositive {
        /// Field name as it appears in configuration.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
    /// An archetype record is unusable.
    #[error("archetype '{id}': {reason}")]
    InvalidArchetype {
        /// Archetype id.
        id: String,
        /// What is wrong with it.
        reason: String,
    },
    /// A path must have at least one segment.
    #[error("path needs at least one segment")]
    NoPathSegments,
    /// Malformed JSON configuration.
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Require `value > 0` and finite.
pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NonPositive { field, value })
    }
}

// =============================================================================
// ARCHETYPES
// =============================================================================

/// Template for one wave's enemy group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupArchetype {
    /// Archetype name (e.g. "swarm")
    pub id: String,
    /// Relative pick weight
    pub weight: u32,
    /// Base enemy count before threat scaling
    pub monster_multiplier: f64,
    /// Base health multiplier before threat scaling
    pub health_multiplier: f64,
    /// Base speed multiplier before threat scaling
    pub speed_multiplier: f64,
    /// Upper bound for the inter-wave delay; also sets spawn cadence.
    /// Must be at least the inter-wave floor.
    pub delay_ms: u64,
}

impl GroupArchetype {
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("monsterMultiplier", self.monster_multiplier),
            ("healthMultiplier", self.health_multiplier),
            ("speedMultiplier", self.speed_multiplier),
        ];

        for (name, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidArchetype {
                    id: self.id.clone(),
                    reason: format!("{} must be positive, got {}", name, value),
                });
            }
        }

        if self.delay_ms < MIN_INTER_WAVE_DELAY_MS {
            return Err(ConfigError::InvalidArchetype {
                id: self.id.clone(),
                reason: format!(
                    "delayMs must be at least {}, got {}",
                    MIN_INTER_WAVE_DELAY_MS, self.delay_ms
                ),
            });
        }

        Ok(())
    }
}

impl Weighted for GroupArchetype {
    fn weight(&self) -> u32 {
        self.weight
    }
}

/// Validated, non-empty list of archetypes with at least one pickable entry.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArchetypeTable {
    archetypes: Vec<GroupArchetype>,
}

impl ArchetypeTable {
    /// Validate a list of archetypes.
    pub fn new(archetypes: Vec<GroupArchetype>) -> Result<Self, ConfigError> {
        validate_archetypes(&archetypes)?;
        Ok(Self { archetypes })
    }

    /// Parse a JSON array of archetype records.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let archetypes: Vec<GroupArchetype> = serde_json::from_str(json)?;
        Self::new(archetypes)
    }

    /// The table bundled with the crate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_json(BUILTIN_ARCHETYPES)
    }

    /// Archetypes in configuration order.
    pub fn as_slice(&self) -> &[GroupArchetype] {
        &self.archetypes
    }

    /// Look up an archetype by id.
    pub fn get(&self, id: &str) -> Option<&GroupArchetype> {
        self.archetypes.iter().find(|a| a.id == id)
    }
}

/// Reject lists that could never yield a pick.
pub fn validate_archetypes(archetypes: &[GroupArchetype]) -> Result<(), ConfigError> {
    if archetypes.is_empty() {
        return Err(ConfigError::EmptyArchetypes);
    }

    for archetype in archetypes {
        archetype.validate()?;
    }

    let total: u64 = archetypes.iter().map(|a| a.weight as u64).sum();
    if total == 0 {
        return Err(ConfigError::ZeroTotalWeight);
    }

    Ok(())
}

// =============================================================================
// ENEMIES AND WEAPONS
// =============================================================================

/// Base stats for a monster type. Portal modifiers scale health and speed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyType {
    /// Type name
    pub id: String,
    /// Hit points before modifiers
    pub health: f64,
    /// Units per second before modifiers
    pub speed: f64,
    /// Exit-portal stability swing when this monster reaches the end
    pub damage: f64,
    /// Materials awarded to the player on kill
    pub materials: u32,
}

impl Default for EnemyType {
    fn default() -> Self {
        Self {
            id: "Walker".to_string(),
            health: 30.0,
            speed: 40.0,
            damage: 5.0,
            materials: 2,
        }
    }
}

impl EnemyType {
    /// Check stats are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("health", self.health)?;
        require_positive("speed", self.speed)?;
        Ok(())
    }
}

/// Stats for a projectile weapon mounted on a tower.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeaponConfig {
    /// Damage per hit
    pub damage: f64,
    /// Damage boost
    pub damage_multiplier: f64,
    /// Shots per second
    pub rate_of_fire: f64,
    /// Fire rate boost
    pub rate_of_fire_multiplier: f64,
    /// Projectile travel speed (units per second)
    pub projectile_speed: f64,
    /// Projectile speed boost
    pub projectile_speed_multiplier: f64,
    /// Targeting radius
    pub range: f64,
}

impl WeaponConfig {
    /// The cannon every tower site can build.
    pub fn cannon() -> Self {
        Self {
            damage: 10.0,
            damage_multiplier: 1.0,
            rate_of_fire: 0.5, // One shot every two seconds
            rate_of_fire_multiplier: 1.0,
            projectile_speed: 400.0,
            projectile_speed_multiplier: 1.0,
            range: 50.0,
        }
    }

    /// Fail fast on missing or non-positive fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("damage", self.damage)?;
        require_positive("damageMultiplier", self.damage_multiplier)?;
        require_positive("rateOfFire", self.rate_of_fire)?;
        require_positive("rateOfFireMultiplier", self.rate_of_fire_multiplier)?;
        require_positive("projectileSpeed", self.projectile_speed)?;
        require_positive("projectileSpeedMultiplier", self.projectile_speed_multiplier)?;
        require_positive("range", self.range)?;
        Ok(())
    }
}

// =============================================================================
// PORTAL AND LEVEL
// =============================================================================

/// Settings for a single portal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalConfig {
    /// Number of path segments to generate
    pub path_segments: usize,
    /// Difficulty; the portal runs `1 + threat_level` waves
    pub threat_level: u32,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            path_segments: 8,
            threat_level: 0,
        }
    }
}

/// Configuration for one level.
#[derive(Clone, Debug)]
pub struct LevelConfig {
    /// Seed for the level RNG stream
    pub seed: u64,
    /// Number of portals to open
    pub portal_count: usize,
    /// Where every portal path and the exit portal are anchored
    pub origin: Vec2,
    /// Segments per portal path
    pub path_segments: usize,
    /// Threat every portal starts from
    pub base_threat: u32,
    /// Extra threat added per portal, drawn from [0, threat_spread]
    pub threat_spread: u32,
    /// Delay before portals activate
    pub countdown_ms: u64,
    /// Global speed scalar
    pub speed: f64,
    /// Base monster stats
    pub walker: EnemyType,
    /// Weapon used when a tower is built
    pub cannon: WeaponConfig,
    /// Wave templates
    pub archetypes: ArchetypeTable,
}

impl LevelConfig {
    /// Level defaults using the given archetype table.
    pub fn with_archetypes(archetypes: ArchetypeTable) -> Self {
        Self {
            seed: 0,
            portal_count: 6,
            origin: Vec2::new(ARENA_WIDTH / 2.0, ARENA_HEIGHT / 2.0),
            path_segments: 8,
            base_threat: 0,
            threat_spread: 2,
            countdown_ms: 10_000, // Ten seconds to place towers
            speed: 1.0,
            walker: EnemyType::default(),
            cannon: WeaponConfig::cannon(),
            archetypes,
        }
    }

    /// Level defaults with the bundled archetype table.
    pub fn builtin() -> Result<Self, ConfigError> {
        Ok(Self::with_archetypes(ArchetypeTable::builtin()?))
    }

    /// Check every nested section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path_segments == 0 {
            return Err(ConfigError::NoPathSegments);
        }
        require_positive("speed", self.speed)?;
        self.walker.validate()?;
        self.cannon.validate()?;
        validate_archetypes(self.archetypes.as_slice())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn archetype(id: &str, weight: u32) -> GroupArchetype {
        GroupArchetype {
            id: id.to_string(),
            weight,
            monster_multiplier: 2.0,
            health_multiplier: 1.0,
            speed_multiplier: 1.0,
            delay_ms: 3000,
        }
    }

    #[test]
    fn test_builtin_table_parses() {
        let table = ArchetypeTable::builtin().unwrap();
        assert!(!table.as_slice().is_empty());
        assert!(table.get("swarm").is_some());
    }

    #[test]
    fn test_from_json_camel_case() {
        let json = r#"[{
            "id": "pack",
            "weight": 1,
            "monsterMultiplier": 3,
            "healthMultiplier": 1.5,
            "speedMultiplier": 0.5,
            "delayMs": 2500
        }]"#;

        let table = ArchetypeTable::from_json(json).unwrap();
        let pack = table.get("pack").unwrap();
        assert_eq!(pack.monster_multiplier, 3.0);
        assert_eq!(pack.delay_ms, 2500);
    }

    #[test]
    fn test_empty_archetypes_rejected() {
        assert!(matches!(ArchetypeTable::new(vec![]), Err(ConfigError::EmptyArchetypes)));
        assert!(matches!(ArchetypeTable::from_json("[]"), Err(ConfigError::EmptyArchetypes)));
    }

    #[test]
    fn test_zero_weights_rejected() {
        let result = ArchetypeTable::new(vec![archetype("a", 0), archetype("b", 0)]);
        assert!(matches!(result, Err(ConfigError::ZeroTotalWeight)));
    }

    #[test]
    fn test_non_positive_multiplier_rejected() {
        let mut bad = archetype("bad", 1);
        bad.health_multiplier = 0.0;

        let result = ArchetypeTable::new(vec![bad]);
        assert!(matches!(result, Err(ConfigError::InvalidArchetype { .. })));
    }

    #[test]
    fn test_zero_delay_rejected() {
        let mut bad = archetype("instant", 1);
        bad.delay_ms = 0;

        let result = ArchetypeTable::new(vec![bad]);
        assert!(matches!(result, Err(ConfigError::InvalidArchetype { .. })));
    }

    #[test]
    fn test_delay_below_wave_floor_rejected() {
        let json = r#"[{"id":"rush","weight":1,"monsterMultiplier":1,
            "healthMultiplier":1,"speedMultiplier":1,"delayMs":1499}]"#;
        assert!(matches!(
            ArchetypeTable::from_json(json),
            Err(ConfigError::InvalidArchetype { .. })
        ));

        let mut edge = archetype("edge", 1);
        edge.delay_ms = MIN_INTER_WAVE_DELAY_MS;
        assert!(ArchetypeTable::new(vec![edge]).is_ok());
    }

    #[test]
    fn test_huge_delay_accepted_and_composes() {
        let mut slow = archetype("glacial", 1);
        slow.delay_ms = u64::MAX;
        let table = ArchetypeTable::new(vec![slow]).unwrap();

        let mut rng = crate::core::rng::DeterministicRng::new(5);
        let plan = crate::game::waves::compose_waves(3, table.as_slice(), &mut rng).unwrap();

        for wave in plan.waves() {
            assert!(wave.inter_wave_delay_ms >= MIN_INTER_WAVE_DELAY_MS);
            assert!(wave.inter_spawn_delay_ms >= crate::MIN_INTER_SPAWN_DELAY_MS);
        }
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(ArchetypeTable::from_json("{ nope"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_weapon_validation() {
        assert!(WeaponConfig::cannon().validate().is_ok());

        let mut no_damage = WeaponConfig::cannon();
        no_damage.damage = 0.0;
        assert!(matches!(
            no_damage.validate(),
            Err(ConfigError::NonPositive { field: "damage", .. })
        ));

        let mut no_rate = WeaponConfig::cannon();
        no_rate.rate_of_fire = -1.0;
        assert!(matches!(
            no_rate.validate(),
            Err(ConfigError::NonPositive { field: "rateOfFire", .. })
        ));

        let mut no_speed = WeaponConfig::cannon();
        no_speed.projectile_speed = f64::NAN;
        assert!(matches!(
            no_speed.validate(),
            Err(ConfigError::NonPositive { field: "projectileSpeed", .. })
        ));

        let mut no_range = WeaponConfig::cannon();
        no_range.range = 0.0;
        assert!(matches!(
            no_range.validate(),
            Err(ConfigError::NonPositive { field: "range", .. })
        ));
    }

    #[test]
    fn test_weapon_missing_field_rejected() {
        let json = r#"{ "damage": 10, "damageMultiplier": 1, "rateOfFire": 1,
            "rateOfFireMultiplier": 1, "projectileSpeedMultiplier": 1, "range": 50 }"#;
        let parsed: Result<WeaponConfig, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_level_config_validation() {
        let mut config = LevelConfig::builtin().unwrap();
        assert!(config.validate().is_ok());

        config.path_segments = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NoPathSegments)));

        config.path_segments = 4;
        config.speed = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::NonPositive { field: "speed", .. })));
    }
}
