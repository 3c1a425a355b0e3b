use anyhow::Result;
use rumqttc::{Client, Connection, ConnectionError, Event, MqttOptions, QoS};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::endpoint::{parse_mqtt_endpoint, TlsMaterials};
use super::Publisher;
use crate::error::PublishError;
use crate::occupancy::OccupancyCounters;

pub const DEFAULT_BROKER: &str = "test.mosquitto.org:1883";
pub const DEFAULT_TOPIC: &str = "vehiculos/conteo";
pub const DEFAULT_CLIENT_ID: &str = "parking-occupancy";

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_PAUSE: Duration = Duration::from_secs(1);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
/// Outgoing request queue depth. A full queue drops the publish.
const REQUEST_CAPACITY: usize = 10;

/// Broker connection parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttSettings {
    /// `host:port`, optionally prefixed with `mqtt://` or `mqtts://`.
    pub broker: String,
    pub topic: String,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls_ca_path: Option<PathBuf>,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            broker: DEFAULT_BROKER.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            username: None,
            password: None,
            tls_ca_path: None,
        }
    }
}

/// Publishes counters to an MQTT topic with QoS 0 (at most once).
///
/// The rumqttc event loop runs on a background thread and reconnects on its
/// own; publishes made while the broker is unreachable are queued up to
/// `REQUEST_CAPACITY` and dropped beyond that.
pub struct MqttPublisher {
    client: Client,
    topic: String,
    closing: Arc<AtomicBool>,
    connection_handle: Option<JoinHandle<()>>,
}

impl MqttPublisher {
    pub fn connect(settings: &MqttSettings) -> Result<Self> {
        let endpoint = parse_mqtt_endpoint(&settings.broker)?;
        let materials = TlsMaterials::load(settings.tls_ca_path.as_deref())?;

        let mut options = MqttOptions::new(&settings.client_id, &endpoint.host, endpoint.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        if let Some(user) = settings.username.as_deref() {
            options.set_credentials(user, settings.password.as_deref().unwrap_or_default());
        }
        options.set_transport(endpoint.transport(&materials)?);

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let closing = Arc::new(AtomicBool::new(false));
        let handle = spawn_event_loop(connection, Arc::clone(&closing));

        log::info!(
            "MQTT publisher for {}:{} (TLS: {}, auth: {}) topic={}",
            endpoint.host,
            endpoint.port,
            endpoint.use_tls,
            settings.username.is_some(),
            settings.topic
        );

        Ok(Self {
            client,
            topic: settings.topic.clone(),
            closing,
            connection_handle: Some(handle),
        })
    }
}

fn spawn_event_loop(mut connection: Connection, closing: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
                Err(ConnectionError::RequestsDone) => break,
                Err(_) if closing.load(Ordering::SeqCst) => break,
                Err(e) => {
                    log::warn!("MQTT connection error: {}", e);
                    std::thread::sleep(RECONNECT_PAUSE);
                }
            }
        }
        log::debug!("MQTT event loop stopped");
    })
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, counters: &OccupancyCounters) -> Result<(), PublishError> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(PublishError::Closed);
        }
        let payload = counters.payload();
        self.client
            .try_publish(&self.topic, QoS::AtMostOnce, false, payload.clone().into_bytes())?;
        log::info!("MQTT -> {} {}", self.topic, payload);
        Ok(())
    }

    fn close(&mut self) -> Result<(), PublishError> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // A full request queue cannot take the disconnect; the event loop
        // exits on its next connection error instead.
        if let Err(e) = self.client.try_disconnect() {
            log::debug!("MQTT disconnect not queued: {}", e);
        }
        if let Some(handle) = self.connection_handle.take() {
            let deadline = Instant::now() + CLOSE_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(20));
            }
            if !handle.is_finished() {
                log::debug!("MQTT event loop still draining, detaching");
            } else if handle.join().is_err() {
                log::warn!("MQTT event loop thread panicked");
            }
        }
        Ok(())
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("MQTT close on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_broker() -> MqttSettings {
        MqttSettings {
            // Nothing listens on port 1; every connect attempt is refused.
            broker: "127.0.0.1:1".to_string(),
            client_id: "parking-occupancy-test".to_string(),
            ..MqttSettings::default()
        }
    }

    fn counters() -> OccupancyCounters {
        OccupancyCounters {
            car: 5,
            motorcycle: 3,
            truck: 5,
        }
    }

    #[test]
    fn publishes_queue_up_to_capacity_then_drop() -> Result<()> {
        let mut publisher = MqttPublisher::connect(&unreachable_broker())?;

        let mut queued = 0;
        let mut dropped = 0;
        for _ in 0..(REQUEST_CAPACITY * 3) {
            match publisher.publish(&counters()) {
                Ok(()) => queued += 1,
                Err(PublishError::Client(_)) => dropped += 1,
                Err(other) => panic!("unexpected publish error: {}", other),
            }
        }
        assert_eq!(queued, REQUEST_CAPACITY);
        assert_eq!(dropped, REQUEST_CAPACITY * 2);

        let started = Instant::now();
        publisher.close()?;
        assert!(started.elapsed() < CLOSE_TIMEOUT + Duration::from_millis(500));

        assert!(matches!(
            publisher.publish(&counters()),
            Err(PublishError::Closed)
        ));
        Ok(())
    }

    #[test]
    fn close_is_bounded_and_idempotent() -> Result<()> {
        let mut publisher = MqttPublisher::connect(&unreachable_broker())?;
        publisher.publish(&counters())?;

        let started = Instant::now();
        publisher.close()?;
        assert!(started.elapsed() < CLOSE_TIMEOUT + Duration::from_millis(500));
        publisher.close()?;
        Ok(())
    }

    #[test]
    fn connect_rejects_bad_broker_address() {
        let settings = MqttSettings {
            broker: "ws://127.0.0.1:1".to_string(),
            ..MqttSettings::default()
        };
        assert!(MqttPublisher::connect(&settings).is_err());
    }
}
