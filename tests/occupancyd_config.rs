use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use parking_occupancy::config::OccupancydConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "OCCUPANCY_CONFIG",
        "OCCUPANCY_SLOTS",
        "OCCUPANCY_THRESHOLD_PX",
        "OCCUPANCY_SOURCE_URL",
        "OCCUPANCY_MQTT_BROKER",
        "OCCUPANCY_MQTT_TOPIC",
        "OCCUPANCY_PUBLISH_INTERVAL_MS",
        "OCCUPANCY_RETRY_DELAY_MS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_defaults_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = OccupancydConfig::load().expect("load config");

    assert_eq!(cfg.slots.car, 5);
    assert_eq!(cfg.slots.motorcycle, 3);
    assert_eq!(cfg.slots.truck, 5);
    assert_eq!(cfg.tracking.threshold_px, 50.0);
    assert_eq!(cfg.tracking.capacity, 50);
    assert_eq!(cfg.mqtt.broker, "test.mosquitto.org:1883");
    assert_eq!(cfg.mqtt.topic, "vehiculos/conteo");
    assert_eq!(cfg.publish_interval, Duration::from_millis(500));
    assert_eq!(cfg.source.url, "stub://parking_lot");
    assert_eq!(cfg.source.width, 640);
    assert_eq!(cfg.source.height, 480);
    assert_eq!(cfg.source.target_fps, 30);
    assert_eq!(cfg.source.retry_delay, Duration::from_secs(2));
    assert_eq!(cfg.detector.backend, "stub");
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "slots": { "car": 12, "motorcycle": 4, "truck": 2 },
        "tracking": { "threshold_px": 35.5, "capacity": 80 },
        "telemetry": {
            "broker": "mqtt://broker.local:1883",
            "topic": "lot/a/free",
            "client_id": "lot-a",
            "publish_interval_ms": 1000,
            "username": "lot"
        },
        "source": {
            "url": "rtsp://camera-1/stream",
            "target_fps": 15,
            "width": 1280,
            "height": 720,
            "retry_delay_ms": 500
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("OCCUPANCY_CONFIG", file.path());
    std::env::set_var("OCCUPANCY_SLOTS", "10, 6, 3");
    std::env::set_var("OCCUPANCY_MQTT_TOPIC", "lot/b/free");
    std::env::set_var("OCCUPANCY_RETRY_DELAY_MS", "250");

    let cfg = OccupancydConfig::load().expect("load config");

    assert_eq!(cfg.slots.car, 10);
    assert_eq!(cfg.slots.motorcycle, 6);
    assert_eq!(cfg.slots.truck, 3);
    assert_eq!(cfg.tracking.threshold_px, 35.5);
    assert_eq!(cfg.tracking.capacity, 80);
    assert_eq!(cfg.mqtt.broker, "mqtt://broker.local:1883");
    assert_eq!(cfg.mqtt.topic, "lot/b/free");
    assert_eq!(cfg.mqtt.client_id, "lot-a");
    assert_eq!(cfg.mqtt.username.as_deref(), Some("lot"));
    assert_eq!(cfg.publish_interval, Duration::from_secs(1));
    assert_eq!(cfg.source.url, "rtsp://camera-1/stream");
    assert_eq!(cfg.source.target_fps, 15);
    assert_eq!(cfg.source.width, 1280);
    assert_eq!(cfg.source.height, 720);
    assert_eq!(cfg.source.retry_delay, Duration::from_millis(250));

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[slots]
car = 8
truck = 1

[telemetry]
topic = "garage/levels/1"

[detector]
backend = "stub"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = OccupancydConfig::load_from(Some(file.path())).expect("load config");

    assert_eq!(cfg.slots.car, 8);
    assert_eq!(cfg.slots.motorcycle, 3);
    assert_eq!(cfg.slots.truck, 1);
    assert_eq!(cfg.mqtt.topic, "garage/levels/1");

    clear_env();
}

#[test]
fn rejects_invalid_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("OCCUPANCY_THRESHOLD_PX", "wide");
    assert!(OccupancydConfig::load().is_err());
    clear_env();

    std::env::set_var("OCCUPANCY_THRESHOLD_PX", "-5");
    assert!(OccupancydConfig::load().is_err());
    clear_env();

    std::env::set_var("OCCUPANCY_PUBLISH_INTERVAL_MS", "0");
    assert!(OccupancydConfig::load().is_err());
    clear_env();

    std::env::set_var("OCCUPANCY_SLOTS", "5,3");
    assert!(OccupancydConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_unknown_backend_and_missing_model() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "detector": { "backend": "opencv" } }"#)
        .expect("write config");
    let err = OccupancydConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("unknown detector backend"));

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "detector": { "backend": "tract" } }"#)
        .expect("write config");
    let err = OccupancydConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("model_path"));

    clear_env();
}

#[test]
fn rejects_unknown_config_keys() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "slots": { "bus": 3 } }"#).expect("write config");
    assert!(OccupancydConfig::load_from(Some(file.path())).is_err());

    clear_env();
}
