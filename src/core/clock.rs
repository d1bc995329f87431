//! Simulation Clock
//!
//! Per-frame timing handed explicitly to every tick call.

use serde::{Serialize, Deserialize};

/// Timing for one simulation frame.
///
/// `speed` is the global slow-motion / fast-forward scalar. It is part of
/// the frame context rather than scene state so that every timed gate and
/// every mover reads the same value for the same frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimContext {
    /// Monotonic clock in milliseconds
    pub now_ms: u64,
    /// Time since the previous frame in milliseconds
    pub delta_ms: u64,
    /// Global speed scalar (1.0 = normal)
    pub speed: f64,
}

impl SimContext {
    /// Context for a frame at `now_ms`.
    pub const fn new(now_ms: u64, delta_ms: u64, speed: f64) -> Self {
        Self { now_ms, delta_ms, speed }
    }

    /// The context for the frame that follows this one.
    pub fn advance(self, delta_ms: u64) -> Self {
        Self {
            now_ms: self.now_ms + delta_ms,
            delta_ms,
            speed: self.speed,
        }
    }

    /// Frame delta in seconds, scaled by `speed`.
    #[inline]
    pub fn scaled_delta_secs(&self) -> f64 {
        self.delta_ms as f64 / 1000.0 * self.speed
    }
}
