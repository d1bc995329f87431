//! # Branching TD Simulation
//!
//! Deterministic portal and wave simulation for a tower-defense level.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BRANCHING TD                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG, weighted picks  │
//! │  ├── vec2.rs     - 2D vector                                 │
//! │  ├── gate.rs     - Deadline-polling timed gate               │
//! │  ├── clock.rs    - Per-frame time and speed                  │
//! │  └── hash.rs     - State hashing for replay checks           │
//! │                                                              │
//! │  game/           - Level simulation                          │
//! │  ├── path.rs     - Path and tower-site generation            │
//! │  ├── waves.rs    - Wave composition                          │
//! │  ├── spawner.rs  - Spawn timing                              │
//! │  ├── portal.rs   - Portal state machine                      │
//! │  ├── monster.rs  - Walkers                                   │
//! │  ├── weapon.rs   - Towers                                    │
//! │  ├── events.rs   - Typed events and listeners                │
//! │  ├── state.rs    - Level state                               │
//! │  └── tick.rs     - Simulation loop                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies; time arrives in a `SimContext`
//! - All randomness from seeded Xorshift128+, one stream per portal
//!
//! Given the same seed and frame sequence, a level produces identical
//! events and an identical state hash.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;

use std::f64::consts::FRAC_PI_4;

// Re-export commonly used types
pub use core::clock::SimContext;
pub use core::rng::DeterministicRng;
pub use core::vec2::Vec2;
pub use game::config::{ConfigError, LevelConfig};
pub use game::events::{EventBus, GameEvent};
pub use game::state::LevelState;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Arena width in world units
pub const ARENA_WIDTH: f64 = 1024.0;

/// Arena height in world units
pub const ARENA_HEIGHT: f64 = 768.0;

/// Frame duration at 60 Hz, rounded down
pub const FRAME_MS: u64 = 16;

/// Shortest path segment
pub const MIN_SEGMENT_LENGTH: u64 = 50;

/// Longest path segment
pub const MAX_SEGMENT_LENGTH: u64 = 100;

/// Each segment turns at most this far from the previous bearing
pub const PATH_CONE_HALF_ANGLE: f64 = FRAC_PI_4;

/// Distance from a path point to its tower site
pub const TOWER_SITE_OFFSET: f64 = 20.0;

/// Floor of the countdown before a wave
pub const MIN_INTER_WAVE_DELAY_MS: u64 = 1500;

/// Floor of the delay between spawns in a wave
pub const MIN_INTER_SPAWN_DELAY_MS: u64 = 200;

/// Time a killed monster takes to drift to the exit
pub const DEATH_DRIFT_MS: u64 = 2000;

/// Exit stability is clamped to ±this
pub const STABILITY_LIMIT: f64 = 100.0;
