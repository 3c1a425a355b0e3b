use serde::Serialize;

use super::proximity::matches;
use super::tracked_set::TrackedSet;
use super::{Category, Point, DEFAULT_THRESHOLD_PX, DEFAULT_TRACKED_CAPACITY};

/// Tracking parameters shared by every category.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerSettings {
    /// Proximity threshold in frame pixels. Re-derive when the input resolution changes.
    pub threshold_px: f64,
    /// Maximum number of points retained per category.
    pub capacity: usize,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            threshold_px: DEFAULT_THRESHOLD_PX,
            capacity: DEFAULT_TRACKED_CAPACITY,
        }
    }
}

/// Entered/exited counts produced by one `step`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub entered: usize,
    pub exited: usize,
}

/// One category's outcome for a frame, with the counter after the update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub category: Category,
    pub entered: usize,
    pub exited: usize,
    pub available: u32,
}

/// Slot accounting for a single vehicle category.
///
/// `available` is kept within `0..=total` by clamping after every step, so
/// excess entries or exits past either bound are absorbed without error.
/// The estimate can drift from the physical count after prolonged
/// misdetection and only re-anchors at the bounds.
#[derive(Clone, Debug)]
pub struct OccupancyTracker {
    category: Category,
    tracked: TrackedSet,
    total: u32,
    available: u32,
    threshold_px: f64,
}

impl OccupancyTracker {
    /// Create a tracker for an empty lot: `available == total`.
    pub fn new(category: Category, total: u32, settings: TrackerSettings) -> Self {
        Self {
            category,
            tracked: TrackedSet::new(settings.capacity),
            total,
            available: total,
            threshold_px: settings.threshold_px,
        }
    }

    /// Advance one frame with this category's current detection centers.
    ///
    /// Both deltas are computed against the previous tracked set before it is
    /// replaced by `current`.
    pub fn step(&mut self, current: &[Point]) -> StepOutcome {
        let entered = current
            .iter()
            .filter(|point| !matches(**point, &self.tracked, self.threshold_px))
            .count();
        let exited = self
            .tracked
            .iter()
            .filter(|point| !matches(**point, current, self.threshold_px))
            .count();

        let next = i64::from(self.available) - entered as i64 + exited as i64;
        self.available = next.clamp(0, i64::from(self.total)) as u32;

        self.tracked.replace(current);

        StepOutcome { entered, exited }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn available(&self) -> u32 {
        self.available
    }

    pub fn tracked(&self) -> &TrackedSet {
        &self.tracked
    }

    pub(crate) fn report(&self, outcome: StepOutcome) -> CategoryReport {
        CategoryReport {
            category: self.category,
            entered: outcome.entered,
            exited: outcome.exited,
            available: self.available,
        }
    }
}
