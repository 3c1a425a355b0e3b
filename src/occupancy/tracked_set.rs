use std::collections::VecDeque;

use super::Point;

/// Bounded collection of the points believed present as of the last frame.
///
/// The set is replaced wholesale every frame. When more points arrive than the
/// capacity allows, the oldest (earliest in frame order) are evicted first.
#[derive(Clone, Debug)]
pub struct TrackedSet {
    points: VecDeque<Point>,
    capacity: usize,
}

impl TrackedSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the contents with `current`, keeping at most `capacity` points.
    pub fn replace(&mut self, current: &[Point]) {
        self.points.clear();
        for &point in current {
            self.push(point);
        }
    }

    fn push(&mut self, point: Point) {
        if self.capacity == 0 {
            return;
        }
        while self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> + '_ {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<'a> IntoIterator for &'a TrackedSet {
    type Item = &'a Point;
    type IntoIter = std::collections::vec_deque::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
