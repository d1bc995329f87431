//! Branching TD Level Runner
//!
//! Runs one seeded level headless, logs its progress, then replays it to
//! check the final state hash.
//!
//! Usage: `branching-td [archetypes.json]`

use std::cell::Cell;
use std::fs;
use std::rc::Rc;

use anyhow::{Context, Result};
use tracing::{debug, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use branching_td::{
    FRAME_MS, VERSION,
    core::clock::SimContext,
    game::{
        config::{ArchetypeTable, LevelConfig},
        events::{EntityRef, EventBus, EventKind, GameEventData},
        overview::PortalOverview,
        snapshot::PlayerSnapshot,
        state::LevelState,
        tick::{run_level, tick},
    },
};

/// Upper bound on frames for one level (about 30 minutes at 60 Hz)
const MAX_FRAMES: u32 = 108_000;

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.as_str())))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Branching TD v{}", VERSION);

    let archetypes = match std::env::args().nth(1) {
        Some(path) => {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("reading archetypes from {path}"))?;
            ArchetypeTable::from_json(&json).with_context(|| format!("parsing {path}"))?
        }
        None => ArchetypeTable::builtin()?,
    };

    let mut config = LevelConfig::with_archetypes(archetypes);
    config.seed = 12345;
    config.validate()?;

    demo_level(&config)
}

/// Run a level, then replay it from the same seed.
fn demo_level(config: &LevelConfig) -> Result<()> {
    info!("=== Starting Demo Level ===");
    info!("Seed: {}", config.seed);

    let initial = build_level(config, PlayerSnapshot::default())?;
    let mut level = initial.clone();

    for portal in level.portals.values() {
        info!(
            "{} threat {} with {} waves, {} monsters, {} tower sites",
            portal.id(),
            portal.threat_level(),
            portal.plan().total_waves(),
            portal.plan().total_monsters(),
            portal.tower_sites().len()
        );
    }

    let mut overview = PortalOverview::from_level(&level);
    let mut bus = EventBus::new();

    let breaches = Rc::new(Cell::new(0u32));
    {
        let breaches = Rc::clone(&breaches);
        bus.on(EntityRef::Level, EventKind::MonsterReachedCore, move |event| {
            if let GameEventData::MonsterReachedCore { alive: true, stability, .. } = event.data {
                breaches.set(breaches.get() + 1);
                debug!(stability, "Monster breached the exit");
            }
        });
    }
    bus.on(EntityRef::Level, EventKind::PortalExpired, |event| {
        if let Some(portal) = event.portal() {
            info!("{} expired at {} ms", portal, event.now_ms);
        }
    });

    let kills = Rc::new(Cell::new(0u32));
    let mut ctx = SimContext::new(0, FRAME_MS, config.speed);
    let mut total_events = 0usize;
    let mut last_report_ms = 0u64;

    for _ in 0..MAX_FRAMES {
        let result = tick(&mut level, ctx);
        total_events += result.events.len();

        // Kill effects are owned by the monster they watch
        for event in &result.events {
            if let GameEventData::SpawnerSpawned { monster, .. } = event.data {
                let kills = Rc::clone(&kills);
                bus.once_for(
                    EntityRef::Monster(monster),
                    EventKind::MonsterKilled,
                    EntityRef::Monster(monster),
                    move |_| kills.set(kills.get() + 1),
                );
            }
            overview.apply(event);
        }

        bus.dispatch(&result.events);
        for entity in &result.released {
            bus.release(*entity);
        }

        // Report every 10 seconds of game time
        if ctx.now_ms - last_report_ms >= 10_000 {
            info!(
                "t={}s: {} portals active, {} monsters, stability {:.1}, {} listeners",
                ctx.now_ms / 1000,
                overview.active_count(),
                level.roster.len(),
                level.exit.stability(),
                bus.len()
            );
            last_report_ms = ctx.now_ms;
        }

        if result.exit_opened {
            info!("Exit opened at {} ms", ctx.now_ms);
            break;
        }
        ctx = ctx.advance(FRAME_MS);
    }

    // Print final results
    info!("=== Level Results ===");
    for line in overview.to_string().lines() {
        info!("{}", line);
    }
    info!("Kills: {}, breaches: {}", kills.get(), breaches.get());
    info!("Exit stability: {:.1}", level.exit.stability());
    info!("Total events: {}", total_events);

    let hash = level.compute_hash();
    info!("Final State Hash: {}", hex::encode(hash));

    // Verify determinism by replaying
    info!("=== Verifying Determinism ===");
    let (replay_final, _) = run_level(initial, SimContext::new(0, FRAME_MS, config.speed), MAX_FRAMES);
    let replay_hash = replay_final.compute_hash();

    info!("Replay State Hash: {}", hex::encode(replay_hash));

    if hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
    } else {
        info!("DETERMINISM FAILURE: Hashes differ!");
    }

    let next = level.next_snapshot();
    info!("Next level snapshot: {}", next.to_json()?);

    Ok(())
}

/// Create the level and build every other tower site.
fn build_level(config: &LevelConfig, player: PlayerSnapshot) -> Result<LevelState> {
    let mut level = LevelState::new(config, player)?;

    let sites: Vec<_> = level.towers.keys().copied().step_by(2).collect();
    for id in sites {
        level.build_tower(id)?;
    }
    let events = level.take_events();
    info!("Built {} towers", events.len());

    Ok(level)
}
