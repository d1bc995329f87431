//! Timed Gate
//!
//! A deadline-polling cooldown: "not ready until `now` is past the stored
//! deadline". The spawner uses it for spawn and wave deadlines, the level
//! uses it for its opening countdown, and weapons use it for fire control.
//!
//! Waiting is never blocking. Callers poll with the current simulation
//! clock every frame.

use serde::{Serialize, Deserialize};

/// Milliseconds in one second, the unit rates are expressed against.
const MS_PER_SECOND: f64 = 1000.0;

/// Deadline-based gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedGate {
    ready_at_ms: u64,
}

impl TimedGate {
    /// A gate that opens on the first frame after `ready_at_ms`.
    pub const fn at(ready_at_ms: u64) -> Self {
        Self { ready_at_ms }
    }

    /// The stored deadline.
    #[inline]
    pub fn ready_at(&self) -> u64 {
        self.ready_at_ms
    }

    /// Strictly past the deadline.
    #[inline]
    pub fn is_ready(&self, now_ms: u64) -> bool {
        now_ms > self.ready_at_ms
    }

    /// Set the deadline `duration_ms` after `now_ms`, scaled by the global
    /// simulation speed. A speed of 2.0 halves every wait.
    pub fn arm(&mut self, now_ms: u64, duration_ms: f64, speed: f64) {
        self.ready_at_ms = now_ms.saturating_add(scaled_duration(duration_ms, speed));
    }

    /// Reset the deadline to zero so the gate is open on any later frame.
    #[inline]
    pub fn clear(&mut self) {
        self.ready_at_ms = 0;
    }

    /// Pass the gate if ready, re-arming it for `duration_ms`.
    pub fn try_pass(&mut self, now_ms: u64, duration_ms: f64, speed: f64) -> bool {
        if !self.is_ready(now_ms) {
            return false;
        }
        self.arm(now_ms, duration_ms, speed);
        true
    }
}

/// Cooldown between actions for something that acts `rate` times per
/// second, boosted by `multiplier`.
#[inline]
pub fn cooldown_from_rate(rate: f64, multiplier: f64) -> f64 {
    MS_PER_SECOND / (rate * multiplier)
}

fn scaled_duration(duration_ms: f64, speed: f64) -> u64 {
    if speed <= 0.0 || !duration_ms.is_finite() {
        return u64::MAX / 2;
    }
    (duration_ms / speed).max(0.0).round() as u64
}

// =============================================================================
// TESTS
// =============================================================================
