//! Exit Portal
//!
//! The level's way out. Monsters arriving alive destabilise it, the essence
//! of killed monsters restores it, and it opens once every portal has
//! expired.

use serde::{Serialize, Deserialize};

use crate::core::hash::StateHasher;
use crate::core::vec2::Vec2;
use crate::STABILITY_LIMIT;

/// The exit portal at the centre of the level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExitPortal {
    /// Position monsters walk toward
    pub position: Vec2,
    stability: f64,
    open: bool,
}

impl ExitPortal {
    /// Closed, with neutral stability.
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            stability: 0.0,
            open: false,
        }
    }

    /// Current stability in [-100, 100].
    pub fn stability(&self) -> f64 {
        self.stability
    }

    /// Whether the exit has opened.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Resolve a monster reaching the end of its path.
    ///
    /// Alive monsters subtract `damage`; dead ones add it back.
    pub fn absorb(&mut self, damage: f64, alive: bool) -> f64 {
        let delta = if alive { -damage } else { damage };
        self.stability = (self.stability + delta).clamp(-STABILITY_LIMIT, STABILITY_LIMIT);
        self.stability
    }

    /// Open if every portal has expired. Returns true only on the frame
    /// the exit opens.
    pub fn try_open(&mut self, all_portals_expired: bool) -> bool {
        if self.open || !all_portals_expired {
            return false;
        }
        self.open = true;
        true
    }

    /// Add this exit to a hash.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_f64(self.stability);
        hasher.update_bool(self.open);
    }
}
