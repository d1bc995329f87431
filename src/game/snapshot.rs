//! Player Snapshot
//!
//! The one document carried from level to level: which level the player
//! is on, what they have banked, and where they stand.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::vec2::Vec2;

/// Current snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshot could not be read.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Malformed JSON.
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Written by an incompatible version.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

/// Player progress between levels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Format version
    pub version: u32,
    /// Levels completed so far; raises portal threat
    pub level: u32,
    /// Materials banked from kills
    pub materials: u32,
    /// Player position
    pub position: Vec2,
}

impl Default for PlayerSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            level: 0,
            materials: 0,
            position: Vec2::ZERO,
        }
    }
}

impl PlayerSnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON, rejecting other versions.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }
        Ok(snapshot)
    }

    /// Snapshot for the following level.
    pub fn next_level(&self, materials: u32, position: Vec2) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            level: self.level + 1,
            materials,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let snapshot = PlayerSnapshot {
            level: 2,
            materials: 14,
            position: Vec2::new(1.5, -3.0),
            ..PlayerSnapshot::default()
        };

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"materials\":14"));
        assert_eq!(PlayerSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_rejects_other_versions() {
        let json = r#"{"version":9,"level":0,"materials":0,"position":{"x":0.0,"y":0.0}}"#;
        assert!(matches!(
            PlayerSnapshot::from_json(json),
            Err(SnapshotError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(PlayerSnapshot::from_json("[1,2"), Err(SnapshotError::Json(_))));
    }

    #[test]
    fn test_next_level() {
        let next = PlayerSnapshot::default().next_level(30, Vec2::new(1.0, 1.0));
        assert_eq!(next.level, 1);
        assert_eq!(next.materials, 30);
    }
}
