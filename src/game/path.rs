//! Path Generation
//!
//! Procedural monster paths. A path wanders outward from a portal's origin
//! one segment at a time, each bearing staying within a cone of the one
//! before, and is then reversed so monsters walk from the outer edge toward
//! the origin. Every segment after the first also yields a tower site set
//! off to the side of the path.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::config::ConfigError;
use crate::{MAX_SEGMENT_LENGTH, MIN_SEGMENT_LENGTH, PATH_CONE_HALF_ANGLE, TOWER_SITE_OFFSET};

/// An ordered polyline. Owned by its portal; monsters only read it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Path {
    points: Vec<Vec2>,
}

impl Path {
    /// Build a path from its points in walking order.
    pub fn new(points: Vec<Vec2>) -> Self {
        debug_assert!(points.len() >= 2, "a path needs at least two points");
        Self { points }
    }

    /// Points in walking order.
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Where monsters enter (the outer anchor).
    pub fn start(&self) -> Vec2 {
        self.points.first().copied().unwrap_or_default()
    }

    /// Where monsters are headed (the inner terminus).
    pub fn end(&self) -> Vec2 {
        self.points.last().copied().unwrap_or_default()
    }

    /// Number of line segments.
    pub fn segment_count(&self) -> usize {
        self.points.len().saturating_sub(1)
    }

    /// Total walking distance.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Point `distance` units along the path, clamped to its ends.
    pub fn position_at_distance(&self, distance: f64) -> Vec2 {
        if distance <= 0.0 {
            return self.start();
        }

        let mut remaining = distance;
        for w in self.points.windows(2) {
            let seg = w[0].distance(w[1]);
            if remaining <= seg {
                if seg == 0.0 {
                    return w[1];
                }
                return w[0].lerp(w[1], remaining / seg);
            }
            remaining -= seg;
        }

        self.end()
    }
}

/// A place beside the path where a tower may be built.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TowerSite {
    /// Where the tower stands
    pub position: Vec2,
    /// The path point the site is bound to
    pub anchor: Vec2,
    /// Index of `anchor` within the final (walking-order) path
    pub path_index: usize,
}

/// Output of [`generate`].
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedPath {
    /// The reversed path, outer anchor first
    pub path: Path,
    /// One site per segment after the first
    pub tower_sites: Vec<TowerSite>,
}

/// Grow a path of `segments` segments outward from `origin`, then reverse it.
///
/// Random draws happen in a fixed order per segment (length, then bearing)
/// so a given stream always yields the same layout.
pub fn generate(
    origin: Vec2,
    segments: usize,
    rng: &mut DeterministicRng,
) -> Result<GeneratedPath, ConfigError> {
    if segments == 0 {
        return Err(ConfigError::NoPathSegments);
    }

    let mut points = Vec::with_capacity(segments + 1);
    points.push(origin);
    let mut sites = Vec::with_capacity(segments - 1);

    for i in 0..segments {
        let from = points[i];
        let previous = if i == 0 { None } else { Some(points[i - 1]) };

        let length = rng.between(MIN_SEGMENT_LENGTH, MAX_SEGMENT_LENGTH) as f64;
        let angle = match previous {
            None => rng.real_in_range(-PI, PI),
            Some(prev) => {
                let bearing = prev.angle_to(from);
                rng.real_in_range(bearing - PATH_CONE_HALF_ANGLE, bearing + PATH_CONE_HALF_ANGLE)
            }
        };

        points.push(from + Vec2::from_angle(angle, length));

        if let Some(prev) = previous {
            sites.push(TowerSite {
                position: site_beside(from, prev),
                anchor: from,
                // `from` is points[i]; after reversal it sits at segments - i
                path_index: segments - i,
            });
        }
    }

    points.reverse();

    Ok(GeneratedPath {
        path: Path::new(points),
        tower_sites: sites,
    })
}

/// Offset perpendicular to the segment arriving at `anchor`, always rotating
/// the back-bearing toward the same side so sites sit on a consistent side.
fn site_beside(anchor: Vec2, previous: Vec2) -> Vec2 {
    let back = anchor.angle_to(previous);
    let angle = if back > -FRAC_PI_2 && back < FRAC_PI_2 {
        back - FRAC_PI_2
    } else {
        back + FRAC_PI_2
    };
    anchor + Vec2::from_angle(angle, TOWER_SITE_OFFSET)
}

// =============================================================================
// TESTS
// =============================================================================
