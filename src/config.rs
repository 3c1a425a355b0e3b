use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::RtspConfig;
use crate::occupancy::{SlotTotals, TrackerSettings, DEFAULT_THRESHOLD_PX, DEFAULT_TRACKED_CAPACITY};
use crate::telemetry::{MqttSettings, DEFAULT_PUBLISH_INTERVAL};

pub const CONFIG_ENV: &str = "OCCUPANCY_CONFIG";

const DEFAULT_SOURCE_URL: &str = "stub://parking_lot";
const DEFAULT_SOURCE_FPS: u32 = 30;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_RETRY_DELAY_MS: u64 = 2_000;
const DEFAULT_DETECTOR_BACKEND: &str = "stub";
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_INPUT_SIZE: u32 = 640;

const KNOWN_BACKENDS: &[&str] = &["stub", "tract"];

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct OccupancydConfigFile {
    slots: Option<SlotsConfigFile>,
    tracking: Option<TrackingConfigFile>,
    telemetry: Option<TelemetryConfigFile>,
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SlotsConfigFile {
    car: Option<u32>,
    motorcycle: Option<u32>,
    truck: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrackingConfigFile {
    threshold_px: Option<f64>,
    capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TelemetryConfigFile {
    broker: Option<String>,
    topic: Option<String>,
    client_id: Option<String>,
    publish_interval_ms: Option<u64>,
    username: Option<String>,
    password: Option<String>,
    tls_ca_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    confidence: Option<f32>,
    iou_threshold: Option<f32>,
    input_size: Option<u32>,
}

/// Resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct OccupancydConfig {
    pub slots: SlotTotals,
    pub tracking: TrackerSettings,
    pub mqtt: MqttSettings,
    pub publish_interval: Duration,
    pub source: SourceSettings,
    pub detector: DetectorSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    pub retry_delay: Duration,
}

impl SourceSettings {
    pub fn rtsp_config(&self) -> RtspConfig {
        RtspConfig {
            url: self.url.clone(),
            target_fps: self.target_fps,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub confidence: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
}

impl Default for OccupancydConfig {
    fn default() -> Self {
        Self::from_file(OccupancydConfigFile::default())
    }
}

impl OccupancydConfig {
    /// Load from `OCCUPANCY_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file path instead of `OCCUPANCY_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => OccupancydConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OccupancydConfigFile) -> Self {
        let slot_defaults = SlotTotals::default();
        let slots_file = file.slots.unwrap_or_default();
        let slots = SlotTotals {
            car: slots_file.car.unwrap_or(slot_defaults.car),
            motorcycle: slots_file.motorcycle.unwrap_or(slot_defaults.motorcycle),
            truck: slots_file.truck.unwrap_or(slot_defaults.truck),
        };

        let tracking_file = file.tracking.unwrap_or_default();
        let tracking = TrackerSettings {
            threshold_px: tracking_file.threshold_px.unwrap_or(DEFAULT_THRESHOLD_PX),
            capacity: tracking_file.capacity.unwrap_or(DEFAULT_TRACKED_CAPACITY),
        };

        let telemetry = file.telemetry.unwrap_or_default();
        let mqtt_defaults = MqttSettings::default();
        let publish_interval = telemetry
            .publish_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_PUBLISH_INTERVAL);
        let mqtt = MqttSettings {
            broker: telemetry.broker.unwrap_or(mqtt_defaults.broker),
            topic: telemetry.topic.unwrap_or(mqtt_defaults.topic),
            client_id: telemetry.client_id.unwrap_or(mqtt_defaults.client_id),
            username: telemetry.username,
            password: telemetry.password,
            tls_ca_path: telemetry.tls_ca_path,
        };

        let source_file = file.source.unwrap_or_default();
        let source = SourceSettings {
            url: source_file
                .url
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            target_fps: source_file.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
            width: source_file.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            retry_delay: Duration::from_millis(
                source_file.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS),
            ),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
            model_path: detector_file.model_path,
            confidence: detector_file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            iou_threshold: detector_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
        };

        Self {
            slots,
            tracking,
            mqtt,
            publish_interval,
            source,
            detector,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(slots) = std::env::var("OCCUPANCY_SLOTS") {
            let parsed = split_csv(&slots);
            if !parsed.is_empty() {
                self.slots = parse_slots(&parsed)?;
            }
        }
        if let Ok(threshold) = std::env::var("OCCUPANCY_THRESHOLD_PX") {
            self.tracking.threshold_px = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("OCCUPANCY_THRESHOLD_PX must be a number of pixels"))?;
        }
        if let Ok(url) = std::env::var("OCCUPANCY_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(broker) = std::env::var("OCCUPANCY_MQTT_BROKER") {
            if !broker.trim().is_empty() {
                self.mqtt.broker = broker;
            }
        }
        if let Ok(topic) = std::env::var("OCCUPANCY_MQTT_TOPIC") {
            if !topic.trim().is_empty() {
                self.mqtt.topic = topic;
            }
        }
        if let Ok(interval) = std::env::var("OCCUPANCY_PUBLISH_INTERVAL_MS") {
            let millis: u64 = interval.trim().parse().map_err(|_| {
                anyhow!("OCCUPANCY_PUBLISH_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.publish_interval = Duration::from_millis(millis);
        }
        if let Ok(delay) = std::env::var("OCCUPANCY_RETRY_DELAY_MS") {
            let millis: u64 = delay.trim().parse().map_err(|_| {
                anyhow!("OCCUPANCY_RETRY_DELAY_MS must be an integer number of milliseconds")
            })?;
            self.source.retry_delay = Duration::from_millis(millis);
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        let threshold = self.tracking.threshold_px;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(anyhow!(
                "tracking.threshold_px must be a positive number (got {})",
                threshold
            ));
        }
        if self.tracking.capacity == 0 {
            return Err(anyhow!("tracking.capacity must be greater than zero"));
        }
        if self.publish_interval.is_zero() {
            return Err(anyhow!("telemetry.publish_interval_ms must be greater than zero"));
        }
        if self.mqtt.topic.trim().is_empty() {
            return Err(anyhow!("telemetry.topic must not be empty"));
        }
        if self.source.url.trim().is_empty() {
            return Err(anyhow!("source.url must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source.width and source.height must be non-zero"));
        }

        self.detector.backend = self.detector.backend.trim().to_lowercase();
        if !KNOWN_BACKENDS.contains(&self.detector.backend.as_str()) {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of: {})",
                self.detector.backend,
                KNOWN_BACKENDS.join(", ")
            ));
        }
        if self.detector.backend == "tract" && self.detector.model_path.is_none() {
            return Err(anyhow!("detector.model_path is required for the tract backend"));
        }
        if !(0.0..=1.0).contains(&self.detector.confidence) {
            return Err(anyhow!("detector.confidence must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return Err(anyhow!("detector.iou_threshold must be within 0..=1"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector.input_size must be non-zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<OccupancydConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

/// `car,motorcycle,truck` slot totals.
fn parse_slots(values: &[String]) -> Result<SlotTotals> {
    if values.len() != 3 {
        return Err(anyhow!(
            "OCCUPANCY_SLOTS expects three values (car,motorcycle,truck), got {}",
            values.len()
        ));
    }
    let parse = |value: &str| -> Result<u32> {
        value
            .parse()
            .map_err(|_| anyhow!("OCCUPANCY_SLOTS entry '{}' is not a slot count", value))
    };
    Ok(SlotTotals {
        car: parse(&values[0])?,
        motorcycle: parse(&values[1])?,
        truck: parse(&values[2])?,
    })
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
