//! Occupancy tracking.
//!
//! Per-category state machines that turn per-frame detection centers into a
//! clamped available-slots counter:
//! - `proximity`: any-match existence test between a point and a reference set
//! - `tracked_set`: bounded, fully-replaced set of last-seen points
//! - `tracker`: one category's entered/exited accounting
//! - `lot`: the three category trackers and their published counters
//!
//! Matching is an existence test, not an assignment. Two detections close to
//! one tracked point both count as "present", so ambiguous neighbourhoods can
//! under-count entries or exits. Counting behaviour depends on this.

mod lot;
mod proximity;
mod tracked_set;
mod tracker;

use serde::Serialize;
use std::fmt;

pub use lot::{Observations, OccupancyCounters, ParkingLot, SlotTotals};
pub use proximity::matches;
pub use tracked_set::TrackedSet;
pub use tracker::{CategoryReport, OccupancyTracker, StepOutcome, TrackerSettings};

/// Default proximity threshold in pixels.
pub const DEFAULT_THRESHOLD_PX: f64 = 50.0;

/// Default bound on tracked points per category.
pub const DEFAULT_TRACKED_CAPACITY: usize = 50;

/// Vehicle category, the unit of capacity accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Car,
    Motorcycle,
    Truck,
}

impl Category {
    /// All categories, in telemetry payload order.
    pub const ALL: [Category; 3] = [Category::Car, Category::Motorcycle, Category::Truck];

    pub(crate) fn index(self) -> usize {
        match self {
            Category::Car => 0,
            Category::Motorcycle => 1,
            Category::Truck => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Car => "car",
            Category::Motorcycle => "motorcycle",
            Category::Truck => "truck",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel center of a detected bounding box.
///
/// Points carry no identity; two points are "the same object" only when
/// `matches` says so.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_order_matches_payload_order() {
        let names: Vec<_> = Category::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, vec!["car", "motorcycle", "truck"]);
        for (i, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn point_distance_is_euclidean() {
        let a = Point::new(0, 0);
        let b = Point::new(3, 4);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(b.distance(&a), 5.0);
    }
}
