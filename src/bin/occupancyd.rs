//! occupancyd - parking occupancy daemon
//!
//! This daemon:
//! 1. Opens the configured frame source (RTSP camera or `stub://` scene)
//! 2. Runs the configured detector on every frame
//! 3. Tracks per-category entries and exits against last frame's centers
//! 4. Publishes available slots `"<car>,<motorcycle>,<truck>"` over MQTT
//!
//! Stop with Ctrl-C, or type `q` and Enter on an interactive terminal.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use parking_occupancy::{
    config::{DetectorSettings, OccupancydConfig},
    telemetry::{LogPublisher, MqttPublisher, Publisher},
    ui::{StartupUi, UiMode},
    AcquisitionSupervisor, BackendRegistry, DetectorBackend, OccupancyPipeline, ParkingLot,
    RtspSource, ShutdownFlag, StubBackend,
};

#[derive(Parser, Debug)]
#[command(
    name = "occupancyd",
    version,
    about = "Estimate free parking slots from a camera and publish them over MQTT"
)]
struct Args {
    /// JSON or TOML config file.
    #[arg(long, env = "OCCUPANCY_CONFIG")]
    config: Option<PathBuf>,

    /// Startup output: auto, plain, or pretty.
    #[arg(long, default_value = "auto")]
    ui: UiMode,

    /// Log counters instead of publishing to the broker.
    #[arg(long, env = "OCCUPANCY_DRY_RUN")]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = StartupUi::new(
        args.ui,
        std::io::stderr().is_terminal(),
        std::io::stdout().is_terminal(),
    );

    let cfg = OccupancydConfig::load_from(args.config.as_deref())?;
    log::info!(
        "slots car={} motorcycle={} truck={} threshold={}px",
        cfg.slots.car,
        cfg.slots.motorcycle,
        cfg.slots.truck,
        cfg.tracking.threshold_px
    );

    let detector = {
        let stage = ui.stage("Load detector");
        match load_detector(&cfg.detector) {
            Ok(detector) => detector,
            Err(e) => {
                stage.fail();
                return Err(e);
            }
        }
    };

    let publisher: Box<dyn Publisher> = if args.dry_run {
        log::info!("dry run: counters are logged, not published");
        Box::new(LogPublisher::new())
    } else {
        let stage = ui.stage("Connect to MQTT broker");
        match MqttPublisher::connect(&cfg.mqtt) {
            Ok(publisher) => Box::new(publisher),
            Err(e) => {
                stage.fail();
                return Err(e);
            }
        }
    };

    let source = RtspSource::new(cfg.source.rtsp_config())?;
    let supervisor = AcquisitionSupervisor::new(source, cfg.source.retry_delay);
    let lot = ParkingLot::new(cfg.slots, cfg.tracking);
    let mut pipeline =
        OccupancyPipeline::new(supervisor, detector, lot, publisher, cfg.publish_interval);

    {
        let stage = ui.stage("Open frame source");
        if !pipeline.start() {
            stage.fail();
            log::warn!(
                "frame source {} not open yet, retrying every {:?}",
                cfg.source.url,
                cfg.source.retry_delay
            );
        }
    }

    let shutdown = ShutdownFlag::new();
    shutdown.install_ctrlc()?;
    if shutdown.watch_stdin().is_some() {
        log::info!("type 'q' and Enter to stop");
    }

    log::info!("occupancyd running. source {}", cfg.source.url);
    let stats = pipeline.run(shutdown.as_atomic());

    if let Err(e) = pipeline.shutdown() {
        log::warn!("telemetry close failed: {}", e);
    }
    log::info!(
        "occupancyd stopped: frames={} skipped={} acquisition_failures={} detection_failures={} publishes={} publish_failures={} final={}",
        stats.frames_processed,
        stats.frames_skipped,
        stats.acquisition_failures,
        stats.detection_failures,
        stats.publishes,
        stats.publish_failures,
        pipeline.lot().counters()
    );
    Ok(())
}

fn load_detector(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new());
    register_tract(&mut registry, settings)?;
    log::info!("detector backends: {}", registry.list().join(", "));

    registry.set_default(&settings.backend)?;
    let mut detector = registry.into_default()?;
    detector.warm_up()?;
    log::info!("detector {} ready", detector.name());
    Ok(detector)
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut BackendRegistry, settings: &DetectorSettings) -> Result<()> {
    use parking_occupancy::detect::{TractBackend, TractSettings};

    let Some(model_path) = settings.model_path.as_ref() else {
        return Ok(());
    };
    let backend = TractBackend::new(
        model_path,
        TractSettings {
            input_size: settings.input_size,
            confidence: settings.confidence,
            iou_threshold: settings.iou_threshold,
        },
    )?;
    registry.register(backend);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut BackendRegistry, settings: &DetectorSettings) -> Result<()> {
    if settings.backend == "tract" {
        return Err(anyhow::anyhow!(
            "detector backend 'tract' requires building with --features backend-tract"
        ));
    }
    Ok(())
}
