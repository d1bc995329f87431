//! Core deterministic primitives.
//!
//! Seeded randomness, planar geometry, the shared timed gate and state
//! fingerprinting. Nothing here knows about portals or monsters.

pub mod rng;
pub mod vec2;
pub mod gate;
pub mod clock;
pub mod hash;

// Re-export core types
pub use vec2::Vec2;
pub use rng::{DeterministicRng, Weighted};
pub use gate::TimedGate;
pub use clock::SimContext;
pub use hash::compute_state_hash;
