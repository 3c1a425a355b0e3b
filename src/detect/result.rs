use crate::occupancy::{Category, Observations, Point};

/// COCO class ids the lot cares about.
pub const COCO_BICYCLE: u32 = 1;
pub const COCO_CAR: u32 = 2;
pub const COCO_MOTORCYCLE: u32 = 3;
pub const COCO_BUS: u32 = 5;
pub const COCO_TRUCK: u32 = 7;

/// Map a detector class onto a vehicle category.
///
/// Buses share the truck pool and bicycles share the motorcycle pool. Every
/// other class is ignored.
pub fn category_for_class(class_id: u32) -> Option<Category> {
    match class_id {
        COCO_CAR => Some(Category::Car),
        COCO_BUS | COCO_TRUCK => Some(Category::Truck),
        COCO_BICYCLE | COCO_MOTORCYCLE => Some(Category::Motorcycle),
        _ => None,
    }
}

/// Result of running detection on a frame.
#[derive(Clone, Debug, Default)]
pub struct DetectionResult {
    /// Boxes in frame pixel coordinates, in detector output order.
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// Centers of every allowed detection, grouped by category.
    pub fn observations(&self) -> Observations {
        self.detections
            .iter()
            .filter_map(|det| det.category().map(|category| (category, det.center())))
            .collect()
    }
}

/// Axis-aligned box `(x1, y1)-(x2, y2)` in frame pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
}

impl Detection {
    pub fn new(class_id: u32, x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self {
            class_id,
            x1,
            y1,
            x2,
            y2,
            confidence,
        }
    }

    pub fn category(&self) -> Option<Category> {
        category_for_class(self.class_id)
    }

    /// Integer midpoint. Corners are truncated to whole pixels first.
    ///
    /// Out-of-range corners saturate to the `i32` bounds.
    pub fn center(&self) -> Point {
        Point::new(midpoint(self.x1, self.x2), midpoint(self.y1, self.y2))
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &Detection) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// Truncating midpoint; the sum is taken in i64 so it cannot overflow.
fn midpoint(a: f32, b: f32) -> i32 {
    ((i64::from(a as i32) + i64::from(b as i32)) / 2) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_mapping_merges_pools() {
        assert_eq!(category_for_class(COCO_CAR), Some(Category::Car));
        assert_eq!(category_for_class(COCO_BUS), Some(Category::Truck));
        assert_eq!(category_for_class(COCO_TRUCK), Some(Category::Truck));
        assert_eq!(category_for_class(COCO_BICYCLE), Some(Category::Motorcycle));
        assert_eq!(category_for_class(COCO_MOTORCYCLE), Some(Category::Motorcycle));
        assert_eq!(category_for_class(0), None); // person
        assert_eq!(category_for_class(9), None);
    }

    #[test]
    fn center_truncates_corners_then_halves() {
        let det = Detection::new(COCO_CAR, 10.9, 20.2, 31.7, 41.0, 0.9);
        // (10 + 31) / 2 = 20, (20 + 41) / 2 = 30
        assert_eq!(det.center(), Point::new(20, 30));
    }

    #[test]
    fn center_of_out_of_range_box_saturates() {
        let det = Detection::new(COCO_CAR, 3.0e9, 0.0, 3.0e9, 10.0, 0.9);
        assert_eq!(det.center(), Point::new(i32::MAX, 5));

        let det = Detection::new(COCO_CAR, -3.0e9, -7.0, 4.0e9, -2.0, 0.9);
        // (i32::MIN + i32::MAX) / 2 = 0, (-7 + -2) / 2 = -4
        assert_eq!(det.center(), Point::new(0, -4));
    }

    #[test]
    fn observations_drop_disallowed_classes() {
        let result = DetectionResult::new(vec![
            Detection::new(COCO_CAR, 0.0, 0.0, 100.0, 100.0, 0.9),
            Detection::new(0, 0.0, 0.0, 10.0, 10.0, 0.9),
            Detection::new(COCO_BUS, 200.0, 200.0, 300.0, 260.0, 0.8),
        ]);
        let obs = result.observations();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs.points(Category::Car), &[Point::new(50, 50)]);
        assert_eq!(obs.points(Category::Truck), &[Point::new(250, 230)]);
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = Detection::new(COCO_CAR, 0.0, 0.0, 10.0, 10.0, 0.9);
        let b = Detection::new(COCO_CAR, 20.0, 20.0, 30.0, 30.0, 0.9);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);
    }
}
