//! Weapons and Towers
//!
//! Fire control and damage are separate capabilities. A cannon composes a
//! [`RateLimitedWeapon`] (when it may fire) with a [`ProjectileWeapon`]
//! (what a shot does). Towers stand on the sites a portal's path produced
//! and hold at most one weapon.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::core::gate::{cooldown_from_rate, TimedGate};
use crate::core::hash::StateHasher;
use crate::core::vec2::Vec2;
use crate::game::config::{ConfigError, WeaponConfig};
use crate::game::monster::{MonsterId, MonsterRoster};
use crate::game::path::TowerSite;
use crate::game::portal::PortalId;

/// Tower identifier, ordered for deterministic iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TowerId(pub u32);

impl fmt::Display for TowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tower#{}", self.0)
    }
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// Fire control: at most `rate_of_fire × multiplier` shots per second.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateLimitedWeapon {
    rate_of_fire: f64,
    multiplier: f64,
    gate: TimedGate,
}

impl RateLimitedWeapon {
    /// Ready to fire on the first frame.
    pub fn new(rate_of_fire: f64, multiplier: f64) -> Self {
        Self {
            rate_of_fire,
            multiplier,
            gate: TimedGate::default(),
        }
    }

    /// Milliseconds between shots at normal speed.
    pub fn cooldown_ms(&self) -> f64 {
        cooldown_from_rate(self.rate_of_fire, self.multiplier)
    }

    /// Whether a shot would be allowed now.
    pub fn can_fire(&self, now_ms: u64) -> bool {
        self.gate.is_ready(now_ms)
    }

    /// Fire if ready, starting the next cooldown.
    pub fn try_fire(&mut self, now_ms: u64, speed: f64) -> bool {
        let cooldown = self.cooldown_ms();
        self.gate.try_pass(now_ms, cooldown, speed)
    }

    /// When the next shot becomes available.
    pub fn next_fire_at(&self) -> u64 {
        self.gate.ready_at()
    }
}

/// A resolved shot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Where it was fired from
    pub origin: Vec2,
    /// Where it was aimed
    pub target: Vec2,
    /// Damage on hit
    pub damage: f64,
    /// Travel speed
    pub speed: f64,
}

/// Damage dealing: projectiles with boosted damage and speed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectileWeapon {
    damage: f64,
    damage_multiplier: f64,
    speed: f64,
    speed_multiplier: f64,
}

impl ProjectileWeapon {
    /// Damage per projectile after boosts.
    pub fn base_damage(&self) -> f64 {
        self.damage * self.damage_multiplier
    }

    /// Projectile speed after boosts.
    pub fn base_projectile_speed(&self) -> f64 {
        self.speed * self.speed_multiplier
    }

    /// A projectile from `origin` toward `target`.
    pub fn fire(&self, origin: Vec2, target: Vec2) -> Projectile {
        Projectile {
            origin,
            target,
            damage: self.base_damage(),
            speed: self.base_projectile_speed(),
        }
    }
}

// =============================================================================
// CANNON
// =============================================================================

/// Buildable tower weapons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TowerKind {
    /// Single-target projectile cannon
    Cannon,
}

/// A rate-limited projectile weapon with a targeting radius.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cannon {
    range: f64,
    fire_control: RateLimitedWeapon,
    projectile: ProjectileWeapon,
    target: Option<MonsterId>,
}

impl Cannon {
    /// Build from validated stats.
    pub fn from_config(config: &WeaponConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            range: config.range,
            fire_control: RateLimitedWeapon::new(config.rate_of_fire, config.rate_of_fire_multiplier),
            projectile: ProjectileWeapon {
                damage: config.damage,
                damage_multiplier: config.damage_multiplier,
                speed: config.projectile_speed,
                speed_multiplier: config.projectile_speed_multiplier,
            },
            target: None,
        })
    }

    /// Targeting radius.
    pub fn range(&self) -> f64 {
        self.range
    }

    /// Fire control.
    pub fn fire_control(&self) -> &RateLimitedWeapon {
        &self.fire_control
    }

    /// Damage capability.
    pub fn projectile(&self) -> &ProjectileWeapon {
        &self.projectile
    }

    /// Current target, if locked.
    pub fn target(&self) -> Option<MonsterId> {
        self.target
    }

    /// Keep the current target while it is alive and in range, otherwise
    /// pick the nearest alive monster in range.
    pub fn acquire_target(&mut self, from: Vec2, roster: &MonsterRoster) -> Option<MonsterId> {
        let keep = self.target.filter(|id| {
            roster
                .get(*id)
                .is_some_and(|m| m.is_alive() && from.distance(m.position) <= self.range)
        });
        self.target = keep.or_else(|| roster.nearest_alive(from, self.range));
        self.target
    }
}

// =============================================================================
// TOWER
// =============================================================================

/// A tower site, built or not.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tower {
    /// Identifier
    pub id: TowerId,
    /// Portal whose path produced the site
    pub portal: PortalId,
    /// Placement
    pub site: TowerSite,
    weapon: Option<Cannon>,
}

impl Tower {
    /// An unbuilt tower on `site`.
    pub fn new(id: TowerId, portal: PortalId, site: TowerSite) -> Self {
        Self {
            id,
            portal,
            site,
            weapon: None,
        }
    }

    /// Whether a weapon has been built.
    pub fn is_built(&self) -> bool {
        self.weapon.is_some()
    }

    /// The mounted weapon.
    pub fn weapon(&self) -> Option<&Cannon> {
        self.weapon.as_ref()
    }

    /// Mount a weapon. Returns false if one is already mounted.
    pub fn build(&mut self, kind: TowerKind, config: &WeaponConfig) -> Result<bool, ConfigError> {
        if self.weapon.is_some() {
            return Ok(false);
        }
        self.weapon = Some(match kind {
            TowerKind::Cannon => Cannon::from_config(config)?,
        });
        Ok(true)
    }

    /// Pick a target and fire at it if the weapon is ready.
    ///
    /// Returns the target and the projectile; the caller resolves the hit.
    pub fn try_attack(
        &mut self,
        now_ms: u64,
        speed: f64,
        roster: &MonsterRoster,
    ) -> Option<(MonsterId, Projectile)> {
        let from = self.site.position;
        let weapon = self.weapon.as_mut()?;

        if !weapon.fire_control.can_fire(now_ms) {
            return None;
        }

        let target = weapon.acquire_target(from, roster)?;
        let target_position = roster.get(target)?.position;

        if !weapon.fire_control.try_fire(now_ms, speed) {
            return None;
        }
        Some((target, weapon.projectile.fire(from, target_position)))
    }

    /// Add this tower to a hash.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.id.0);
        hasher.update_bool(self.is_built());
        if let Some(weapon) = &self.weapon {
            hasher.update_u64(weapon.fire_control.next_fire_at());
            hasher.update_u32(weapon.target.map_or(u32::MAX, |t| t.0));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::EnemyType;
    use crate::game::path::Path;
    use crate::game::portal::PortalHost;
    use crate::game::waves::StatModifiers;

    fn site_at(x: f64, y: f64) -> TowerSite {
        TowerSite {
            position: Vec2::new(x, y),
            anchor: Vec2::new(x, y + 20.0),
            path_index: 1,
        }
    }

    fn roster_with(positions: &[Vec2]) -> (MonsterRoster, Vec<MonsterId>) {
        let path = Path::new(vec![Vec2::ZERO, Vec2::new(1000.0, 0.0)]);
        let mut roster = MonsterRoster::new(EnemyType::default());
        let ids = positions
            .iter()
            .map(|p| {
                let id = roster.spawn_monster(PortalId(0), &path, StatModifiers::default());
                roster.get_mut(id).unwrap().position = *p;
                id
            })
            .collect();
        (roster, ids)
    }

    #[test]
    fn test_rate_limited_weapon() {
        let mut weapon = RateLimitedWeapon::new(0.5, 1.0);
        assert_eq!(weapon.cooldown_ms(), 2000.0);

        assert!(weapon.try_fire(1, 1.0));
        assert!(!weapon.try_fire(1000, 1.0));
        assert!(!weapon.try_fire(2001, 1.0));
        assert!(weapon.try_fire(2002, 1.0));

        // Double speed halves the wait
        assert_eq!(weapon.next_fire_at(), 4002);
        let mut fast = RateLimitedWeapon::new(0.5, 1.0);
        fast.try_fire(1, 2.0);
        assert_eq!(fast.next_fire_at(), 1001);
    }

    #[test]
    fn test_projectile_weapon_boosts() {
        let mut config = WeaponConfig::cannon();
        config.damage_multiplier = 2.0;
        config.projectile_speed_multiplier = 0.5;
        let cannon = Cannon::from_config(&config).unwrap();

        assert_eq!(cannon.projectile().base_damage(), 20.0);
        assert_eq!(cannon.projectile().base_projectile_speed(), 200.0);

        let shot = cannon.projectile().fire(Vec2::ZERO, Vec2::new(1.0, 1.0));
        assert_eq!(shot.damage, 20.0);
        assert_eq!(shot.target, Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_cannon_rejects_bad_config() {
        let mut config = WeaponConfig::cannon();
        config.range = 0.0;
        assert!(Cannon::from_config(&config).is_err());
    }

    #[test]
    fn test_build_once() {
        let mut tower = Tower::new(TowerId(0), PortalId(0), site_at(0.0, 0.0));
        assert!(!tower.is_built());

        assert!(tower.build(TowerKind::Cannon, &WeaponConfig::cannon()).unwrap());
        assert!(!tower.build(TowerKind::Cannon, &WeaponConfig::cannon()).unwrap());
        assert!(tower.is_built());
    }

    #[test]
    fn test_unbuilt_tower_never_attacks() {
        let (roster, _) = roster_with(&[Vec2::new(1.0, 0.0)]);
        let mut tower = Tower::new(TowerId(0), PortalId(0), site_at(0.0, 0.0));
        assert!(tower.try_attack(100, 1.0, &roster).is_none());
    }

    #[test]
    fn test_attack_nearest_in_range() {
        let (roster, ids) = roster_with(&[
            Vec2::new(40.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(200.0, 0.0),
        ]);
        let mut tower = Tower::new(TowerId(0), PortalId(0), site_at(0.0, 0.0));
        tower.build(TowerKind::Cannon, &WeaponConfig::cannon()).unwrap();

        let (target, shot) = tower.try_attack(1, 1.0, &roster).unwrap();
        assert_eq!(target, ids[1]);
        assert_eq!(shot.damage, 10.0);

        // Cooling down
        assert!(tower.try_attack(100, 1.0, &roster).is_none());
    }

    #[test]
    fn test_target_is_sticky_while_valid() {
        let (mut roster, ids) = roster_with(&[Vec2::new(40.0, 0.0)]);
        let mut cannon = Cannon::from_config(&WeaponConfig::cannon()).unwrap();

        assert_eq!(cannon.acquire_target(Vec2::ZERO, &roster), Some(ids[0]));

        // A closer monster appears; the lock holds
        let path = Path::new(vec![Vec2::ZERO, Vec2::new(1000.0, 0.0)]);
        let closer = roster.spawn_monster(PortalId(0), &path, StatModifiers::default());
        roster.get_mut(closer).unwrap().position = Vec2::new(5.0, 0.0);
        assert_eq!(cannon.acquire_target(Vec2::ZERO, &roster), Some(ids[0]));

        // The locked target leaves range; retarget
        roster.get_mut(ids[0]).unwrap().position = Vec2::new(80.0, 0.0);
        assert_eq!(cannon.acquire_target(Vec2::ZERO, &roster), Some(closer));
    }
}
