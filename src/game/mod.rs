//! Game Logic Module
//!
//! All level simulation code. Deterministic given a seed and a frame
//! sequence.
//!
//! ## Module Structure
//!
//! - `config`: Archetypes, enemy and weapon stats, level setup
//! - `path`: Path generation and tower sites
//! - `waves`: Wave composition from threat level
//! - `spawner`: Spawn timing and wave cursor
//! - `portal`: Portal wave state machine
//! - `monster`: Path-following monsters
//! - `weapon`: Rate-limited weapons and towers
//! - `exit`: Exit portal stability
//! - `events`: Typed game events and listener bus
//! - `overview`: Per-portal status fed from events
//! - `snapshot`: Player progress between levels
//! - `state`: Level state
//! - `tick`: Per-frame simulation loop

pub mod config;
pub mod path;
pub mod waves;
pub mod spawner;
pub mod portal;
pub mod monster;
pub mod weapon;
pub mod exit;
pub mod events;
pub mod overview;
pub mod snapshot;
pub mod state;
pub mod tick;

// Re-export key types
pub use config::{ArchetypeTable, ConfigError, GroupArchetype, LevelConfig, PortalConfig};
pub use events::{EventBus, EventKind, GameEvent, GameEventData};
pub use overview::PortalOverview;
pub use portal::{Portal, PortalHost, PortalId, PortalState};
pub use snapshot::PlayerSnapshot;
pub use state::{LevelPhase, LevelState};
pub use tick::{tick, TickResult};
