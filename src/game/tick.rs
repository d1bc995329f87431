//! Level Simulation Tick
//!
//! One frame of the level, in a fixed order. Kills from tower fire are
//! applied before portals tick, so a portal waiting on its last monster
//! sees that monster dead in the same frame.

use tracing::info;

use crate::core::clock::SimContext;
use crate::game::events::{EntityRef, GameEvent, GameEventData};
use crate::game::monster::MonsterId;
use crate::game::state::{LevelPhase, LevelState};
use crate::game::weapon::TowerId;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Whether the exit opened this tick
    pub exit_opened: bool,
    /// Entities that left the simulation this tick; release their
    /// subscriptions
    pub released: Vec<EntityRef>,
}

/// Run one simulation tick.
///
/// # Arguments
///
/// * `level` - The level state (will be mutated)
/// * `ctx` - Clock, frame delta and global speed for this frame
///
/// # Determinism
///
/// Given the same level and the same sequence of contexts, the resulting
/// state and events are identical: all iteration is over BTreeMaps and all
/// randomness was consumed at construction.
pub fn tick(level: &mut LevelState, ctx: SimContext) -> TickResult {
    let mut result = TickResult::default();
    level.now_ms = ctx.now_ms;

    // 1. Level countdown (activates waiting portals)
    update_countdown(level, &ctx);
    level.collect_portal_events();

    // 2. Move monsters, resolve arrivals at the exit
    advance_monsters(level, &ctx, &mut result);

    // 3. Towers fire; kills land immediately. Dead walkers stay in the
    // roster until they drift to the exit, but no longer count as live.
    fire_towers(level, &ctx);

    // 4. Portal state machines, against liveness after all kills
    for portal in level.portals.values_mut() {
        portal.tick(&ctx, &mut level.roster);
    }
    level.collect_portal_events();

    // 5. Open the exit once every portal has expired
    check_exit(level, &mut result);

    // Collect events
    result.events = level.take_events();

    result
}

fn update_countdown(level: &mut LevelState, ctx: &SimContext) {
    match level.phase {
        LevelPhase::Pending => {
            level
                .countdown
                .arm(ctx.now_ms, level.countdown_ms() as f64, ctx.speed);
            level.phase = LevelPhase::Countdown;
            let ends_at_ms = level.countdown.ready_at();
            level.push_event(GameEvent::new(ctx.now_ms, GameEventData::CountdownStarted { ends_at_ms }));
        }
        LevelPhase::Countdown => {
            if !level.countdown.is_ready(ctx.now_ms) {
                return;
            }
            level.phase = LevelPhase::Running;
            level.push_event(GameEvent::new(ctx.now_ms, GameEventData::CountdownEnded));
            info!(now_ms = ctx.now_ms, "Countdown ended, activating portals");

            for portal in level.portals.values_mut() {
                portal.activate(ctx.now_ms, ctx.speed);
            }
        }
        LevelPhase::Running | LevelPhase::ExitOpen => {}
    }
}

fn advance_monsters(level: &mut LevelState, ctx: &SimContext, result: &mut TickResult) {
    let mut arrived: Vec<MonsterId> = Vec::new();

    for walker in level.roster.iter_mut() {
        // Monsters are removed with their portal, so the lookup succeeds
        let Some(portal) = level.portals.get(&walker.portal) else {
            arrived.push(walker.id);
            continue;
        };
        if walker.advance(ctx, portal.path()) {
            arrived.push(walker.id);
        }
    }

    for id in arrived {
        let Some(walker) = level.roster.remove(id) else {
            continue;
        };
        let alive = walker.is_alive();
        let stability = level.exit.absorb(walker.stability_damage, alive);

        level.push_event(GameEvent::new(
            ctx.now_ms,
            GameEventData::MonsterReachedCore {
                monster: id,
                portal: walker.portal,
                alive,
                stability,
            },
        ));
        result.released.push(EntityRef::Monster(id));
    }
}

fn fire_towers(level: &mut LevelState, ctx: &SimContext) {
    // Collect IDs first; each hit mutates the level
    let tower_ids: Vec<TowerId> = level
        .towers
        .values()
        .filter(|t| t.is_built())
        .map(|t| t.id)
        .collect();

    for id in tower_ids {
        let Some(tower) = level.towers.get_mut(&id) else {
            continue;
        };
        let Some((target, shot)) = tower.try_attack(ctx.now_ms, ctx.speed, &level.roster) else {
            continue;
        };

        level.push_event(GameEvent::new(
            ctx.now_ms,
            GameEventData::TowerFired { tower: id, monster: target, damage: shot.damage },
        ));
        level.damage_monster(target, shot.damage);
    }
}

fn check_exit(level: &mut LevelState, result: &mut TickResult) {
    if level.phase != LevelPhase::Running || !level.all_portals_expired() {
        return;
    }
    if !level.exit.try_open(true) {
        return;
    }

    level.phase = LevelPhase::ExitOpen;
    result.exit_opened = true;

    let stability = level.exit.stability();
    info!(stability, "Exit portal opened");
    level.push_event(GameEvent::new(level.now_ms, GameEventData::ExitPortalActivated { stability }));
}

/// Run up to `frames` frames of `frame_ms` each, starting at `start`.
///
/// Stops early on the frame the exit opens. Used for replay verification.
pub fn run_level(
    initial: LevelState,
    start: SimContext,
    frames: u32,
) -> (LevelState, Vec<GameEvent>) {
    let mut level = initial;
    let mut all_events = Vec::new();
    let mut ctx = start;

    for _ in 0..frames {
        let result = tick(&mut level, ctx);
        all_events.extend(result.events);

        if result.exit_opened {
            break;
        }
        ctx = ctx.advance(start.delta_ms);
    }

    (level, all_events)
}

// =============================================================================
// TESTS
// =============================================================================
