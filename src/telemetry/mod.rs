//! Telemetry publishing.
//!
//! Counters leave the process as a single comma-joined payload,
//! `"<car>,<motorcycle>,<truck>"`, at most once per publish interval.
//! Publishing is fire-and-forget: nothing is acknowledged or retried, and the
//! latest value supersedes earlier ones.

mod endpoint;
mod mqtt;
mod throttle;

pub use endpoint::{parse_mqtt_endpoint, MqttEndpoint, TlsMaterials};
pub use mqtt::{MqttPublisher, MqttSettings, DEFAULT_BROKER, DEFAULT_CLIENT_ID, DEFAULT_TOPIC};
pub use throttle::{PublishThrottle, DEFAULT_PUBLISH_INTERVAL};

use crate::error::PublishError;
use crate::occupancy::OccupancyCounters;

/// Sink for occupancy counters.
pub trait Publisher {
    /// Hand the counters to the transport without waiting for delivery.
    fn publish(&mut self, counters: &OccupancyCounters) -> Result<(), PublishError>;

    /// Flush and close the connection.
    fn close(&mut self) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Publisher that only logs, for runs without a broker.
#[derive(Debug, Default)]
pub struct LogPublisher {
    published: u64,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.published
    }
}

impl Publisher for LogPublisher {
    fn publish(&mut self, counters: &OccupancyCounters) -> Result<(), PublishError> {
        self.published += 1;
        log::info!("telemetry (dry run) -> {}", counters.payload());
        Ok(())
    }
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn publish(&mut self, counters: &OccupancyCounters) -> Result<(), PublishError> {
        (**self).publish(counters)
    }

    fn close(&mut self) -> Result<(), PublishError> {
        (**self).close()
    }
}
