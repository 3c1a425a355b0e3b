use serde::Serialize;
use std::fmt;

use super::tracker::{CategoryReport, OccupancyTracker, TrackerSettings};
use super::{Category, Point};

/// Configured number of slots per category.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotTotals {
    pub car: u32,
    pub motorcycle: u32,
    pub truck: u32,
}

impl SlotTotals {
    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::Car => self.car,
            Category::Motorcycle => self.motorcycle,
            Category::Truck => self.truck,
        }
    }
}

impl Default for SlotTotals {
    fn default() -> Self {
        Self {
            car: 5,
            motorcycle: 3,
            truck: 5,
        }
    }
}

/// Detection centers for one frame, grouped by category in frame order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Observations {
    by_category: [Vec<Point>; 3],
}

impl Observations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, category: Category, point: Point) {
        self.by_category[category.index()].push(point);
    }

    pub fn points(&self, category: Category) -> &[Point] {
        &self.by_category[category.index()]
    }

    pub fn len(&self) -> usize {
        self.by_category.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.iter().all(Vec::is_empty)
    }
}

impl FromIterator<(Category, Point)> for Observations {
    fn from_iter<I: IntoIterator<Item = (Category, Point)>>(iter: I) -> Self {
        let mut observations = Observations::new();
        for (category, point) in iter {
            observations.push(category, point);
        }
        observations
    }
}

/// Snapshot of available slots, in telemetry order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OccupancyCounters {
    pub car: u32,
    pub motorcycle: u32,
    pub truck: u32,
}

impl OccupancyCounters {
    /// Telemetry payload: `"<car>,<motorcycle>,<truck>"`.
    pub fn payload(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OccupancyCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.car, self.motorcycle, self.truck)
    }
}

/// The three category trackers of one camera view.
///
/// Categories share no state; a point that changes category between frames
/// is an exit in the old category and an entry in the new one.
#[derive(Clone, Debug)]
pub struct ParkingLot {
    trackers: [OccupancyTracker; 3],
}

impl ParkingLot {
    pub fn new(slots: SlotTotals, settings: TrackerSettings) -> Self {
        let trackers = Category::ALL
            .map(|category| OccupancyTracker::new(category, slots.get(category), settings));
        Self { trackers }
    }

    /// Step every category tracker with this frame's observations.
    pub fn update(&mut self, observations: &Observations) -> [CategoryReport; 3] {
        Category::ALL.map(|category| {
            let tracker = &mut self.trackers[category.index()];
            let outcome = tracker.step(observations.points(category));
            tracker.report(outcome)
        })
    }

    pub fn tracker(&self, category: Category) -> &OccupancyTracker {
        &self.trackers[category.index()]
    }

    pub fn available(&self, category: Category) -> u32 {
        self.tracker(category).available()
    }

    pub fn counters(&self) -> OccupancyCounters {
        OccupancyCounters {
            car: self.available(Category::Car),
            motorcycle: self.available(Category::Motorcycle),
            truck: self.available(Category::Truck),
        }
    }
}

impl Default for ParkingLot {
    fn default() -> Self {
        Self::new(SlotTotals::default(), TrackerSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lot_reports_full_capacity() {
        let lot = ParkingLot::default();
        assert_eq!(
            lot.counters(),
            OccupancyCounters {
                car: 5,
                motorcycle: 3,
                truck: 5
            }
        );
    }

    #[test]
    fn payload_is_car_motorcycle_truck() {
        let counters = OccupancyCounters {
            car: 4,
            motorcycle: 1,
            truck: 0,
        };
        assert_eq!(counters.payload(), "4,1,0");
    }

    #[test]
    fn categories_are_updated_independently() {
        let mut lot = ParkingLot::default();
        let observations: Observations = [
            (Category::Car, Point::new(100, 100)),
            (Category::Car, Point::new(400, 100)),
            (Category::Truck, Point::new(300, 300)),
        ]
        .into_iter()
        .collect();

        let reports = lot.update(&observations);
        assert_eq!(reports[0].category, Category::Car);
        assert_eq!(reports[0].entered, 2);
        assert_eq!(reports[1].entered, 0);
        assert_eq!(reports[2].entered, 1);
        assert_eq!(lot.counters().payload(), "3,3,4");
    }

    #[test]
    fn category_change_is_exit_plus_entry() {
        let mut lot = ParkingLot::default();
        let point = Point::new(250, 250);

        let mut first = Observations::new();
        first.push(Category::Car, point);
        lot.update(&first);
        assert_eq!(lot.available(Category::Car), 4);

        let mut second = Observations::new();
        second.push(Category::Truck, point);
        let reports = lot.update(&second);
        assert_eq!(reports[0].exited, 1);
        assert_eq!(reports[2].entered, 1);
        assert_eq!(lot.available(Category::Car), 5);
        assert_eq!(lot.available(Category::Truck), 4);
    }

    #[test]
    fn observations_count_across_categories() {
        let mut observations = Observations::new();
        assert!(observations.is_empty());
        observations.push(Category::Motorcycle, Point::new(1, 1));
        observations.push(Category::Truck, Point::new(2, 2));
        assert_eq!(observations.len(), 2);
        assert_eq!(observations.points(Category::Car), &[] as &[Point]);
    }
}
