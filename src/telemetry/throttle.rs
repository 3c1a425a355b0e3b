use std::time::{Duration, Instant};

/// Default minimum spacing between publishes.
pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_millis(500);

/// Monotonic-clock gate for telemetry.
///
/// The clock starts at construction, so the first publish happens one
/// interval after start-up.
#[derive(Clone, Debug)]
pub struct PublishThrottle {
    interval: Duration,
    last: Instant,
}

impl PublishThrottle {
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    /// True when at least one interval has passed since the last publish.
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) >= self.interval
    }

    /// Record a publish attempt at `now`, successful or not.
    pub fn record(&mut self, now: Instant) {
        self.last = now;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_publish_waits_one_interval() {
        let start = Instant::now();
        let throttle = PublishThrottle::starting_at(Duration::from_millis(500), start);
        assert!(!throttle.is_due(start));
        assert!(!throttle.is_due(start + Duration::from_millis(499)));
        assert!(throttle.is_due(start + Duration::from_millis(500)));
    }

    #[test]
    fn record_resets_the_gate() {
        let start = Instant::now();
        let mut throttle = PublishThrottle::starting_at(Duration::from_millis(500), start);
        let t1 = start + Duration::from_millis(600);
        assert!(throttle.is_due(t1));
        throttle.record(t1);
        assert!(!throttle.is_due(t1 + Duration::from_millis(100)));
        assert!(throttle.is_due(t1 + Duration::from_millis(500)));
    }

    #[test]
    fn zero_interval_is_always_due() {
        let start = Instant::now();
        let throttle = PublishThrottle::starting_at(Duration::ZERO, start);
        assert!(throttle.is_due(start));
        assert_eq!(throttle.interval(), Duration::ZERO);
    }
}
