//! The acquire → detect → track → publish loop.
//!
//! One iteration pulls a frame, runs the detector, steps every category
//! tracker, and publishes the counters when the throttle allows. Failures are
//! classified by `LoopError` and handled without leaving the loop:
//! acquisition and detection failures reinitialise the frame source, publish
//! failures drop that update.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::detect::DetectorBackend;
use crate::error::{LoopError, LoopResult, PublishError};
use crate::ingest::{AcquisitionSupervisor, FrameSource};
use crate::occupancy::{CategoryReport, OccupancyCounters, ParkingLot};
use crate::telemetry::{PublishThrottle, Publisher};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Per-frame outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FrameReport {
    pub sequence: u64,
    pub detections: usize,
    pub categories: [CategoryReport; 3],
    pub counters: OccupancyCounters,
    /// Whether these counters were handed to the publisher.
    pub published: bool,
}

impl FrameReport {
    /// One-line JSON form for debug logs.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Iteration {
    Processed(FrameReport),
    /// The source yielded nothing usable; no tracker or publish step ran.
    Skipped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_processed: u64,
    pub frames_skipped: u64,
    pub acquisition_failures: u64,
    pub detection_failures: u64,
    pub publishes: u64,
    pub publish_failures: u64,
}

pub struct OccupancyPipeline<S: FrameSource, P: Publisher> {
    supervisor: AcquisitionSupervisor<S>,
    detector: Box<dyn DetectorBackend>,
    lot: ParkingLot,
    publisher: P,
    throttle: PublishThrottle,
    stats: PipelineStats,
    last_health_log: Instant,
}

impl<S: FrameSource, P: Publisher> OccupancyPipeline<S, P> {
    pub fn new(
        supervisor: AcquisitionSupervisor<S>,
        detector: Box<dyn DetectorBackend>,
        lot: ParkingLot,
        publisher: P,
        publish_interval: Duration,
    ) -> Self {
        Self {
            supervisor,
            detector,
            lot,
            publisher,
            throttle: PublishThrottle::new(publish_interval),
            stats: PipelineStats::default(),
            last_health_log: Instant::now(),
        }
    }

    /// Open the frame source and restart the publish clock. Returns whether
    /// the source opened; a closed source is retried by the loop.
    pub fn start(&mut self) -> bool {
        let connected = self.supervisor.start();
        let now = Instant::now();
        self.throttle = PublishThrottle::starting_at(self.throttle.interval(), now);
        self.last_health_log = now;
        log::info!(
            "occupancy pipeline started (detector={}, publish every {:?})",
            self.detector.name(),
            self.throttle.interval()
        );
        connected
    }

    /// Run a single iteration.
    pub fn run_once(&mut self) -> LoopResult<Iteration> {
        let frame = match self.supervisor.next_frame()? {
            Some(frame) => frame,
            None => {
                self.stats.frames_skipped += 1;
                return Ok(Iteration::Skipped);
            }
        };

        let result = frame
            .run_detector(self.detector.as_mut())
            .map_err(LoopError::Detection)?;
        let categories = self.lot.update(&result.observations());
        self.stats.frames_processed += 1;

        let counters = self.lot.counters();
        let now = Instant::now();
        let mut published = false;
        if self.throttle.is_due(now) {
            self.throttle.record(now);
            self.publisher.publish(&counters)?;
            self.stats.publishes += 1;
            published = true;
        }

        let report = FrameReport {
            sequence: frame.sequence,
            detections: result.detections.len(),
            categories,
            counters,
            published,
        };
        if log::log_enabled!(log::Level::Debug) {
            match report.to_json() {
                Ok(line) => log::debug!("frame age={:.3}s {}", frame.age_secs_f64(), line),
                Err(e) => log::debug!("frame {} report not serialisable: {}", frame.sequence, e),
            }
        }
        Ok(Iteration::Processed(report))
    }

    /// Apply the recovery policy for a failed iteration.
    pub fn handle_failure(&mut self, err: LoopError) {
        match &err {
            LoopError::Acquisition(_) => self.stats.acquisition_failures += 1,
            LoopError::Detection(_) => self.stats.detection_failures += 1,
            LoopError::Publish(_) => self.stats.publish_failures += 1,
        }
        if err.requires_capture_reset() {
            self.supervisor.recover(&err);
        } else {
            log::warn!("{}; update dropped", err);
        }
    }

    /// Loop until `stop` is set. The flag is checked between iterations,
    /// including while the source is being reinitialised.
    pub fn run(&mut self, stop: &AtomicBool) -> PipelineStats {
        while !stop.load(Ordering::SeqCst) {
            if let Err(err) = self.run_once() {
                self.handle_failure(err);
            }
            self.maybe_log_health();
        }
        log::info!("occupancy pipeline stopping");
        self.stats
    }

    fn maybe_log_health(&mut self) {
        if self.last_health_log.elapsed() < HEALTH_LOG_INTERVAL {
            return;
        }
        let source = self.supervisor.stats();
        log::info!(
            "health source={} healthy={} frames={} skipped={} acquisition_failures={} publishes={} publish_failures={} counters={}",
            source.url,
            self.supervisor.is_healthy(),
            self.stats.frames_processed,
            self.stats.frames_skipped,
            self.stats.acquisition_failures,
            self.stats.publishes,
            self.stats.publish_failures,
            self.lot.counters()
        );
        self.last_health_log = Instant::now();
    }

    /// Close the publisher and release the frame source.
    pub fn shutdown(&mut self) -> Result<(), PublishError> {
        let closed = self.publisher.close();
        self.supervisor.stop();
        closed
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn lot(&self) -> &ParkingLot {
        &self.lot
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn supervisor(&self) -> &AcquisitionSupervisor<S> {
        &self.supervisor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detection, StubBackend, COCO_CAR};
    use crate::ingest::{RtspConfig, RtspSource};
    use crate::telemetry::LogPublisher;

    fn stub_source(url: &str) -> RtspSource {
        RtspSource::new(RtspConfig {
            url: url.to_string(),
            target_fps: 1000,
            width: 32,
            height: 24,
        })
        .unwrap()
    }

    #[test]
    fn processes_frames_and_publishes_when_due() {
        let car = Detection::new(COCO_CAR, 0.0, 0.0, 10.0, 10.0, 0.9);
        let supervisor = AcquisitionSupervisor::new(stub_source("stub://lot"), Duration::ZERO);
        let mut pipeline = OccupancyPipeline::new(
            supervisor,
            Box::new(StubBackend::scripted(vec![vec![car]])),
            ParkingLot::default(),
            LogPublisher::new(),
            Duration::ZERO,
        );
        pipeline.start();

        let Iteration::Processed(report) = pipeline.run_once().unwrap() else {
            panic!("expected a processed frame");
        };
        assert_eq!(report.detections, 1);
        assert!(report.published);
        assert_eq!(report.counters.car, 4);
        assert_eq!(pipeline.publisher().published(), 1);
        assert_eq!(pipeline.stats().frames_processed, 1);
    }

    #[test]
    fn frame_report_renders_as_json() {
        let car = Detection::new(COCO_CAR, 0.0, 0.0, 10.0, 10.0, 0.9);
        let supervisor = AcquisitionSupervisor::new(stub_source("stub://lot"), Duration::ZERO);
        let mut pipeline = OccupancyPipeline::new(
            supervisor,
            Box::new(StubBackend::scripted(vec![vec![car]])),
            ParkingLot::default(),
            LogPublisher::new(),
            Duration::from_secs(3600),
        );
        assert!(pipeline.start());

        let Iteration::Processed(report) = pipeline.run_once().unwrap() else {
            panic!("expected a processed frame");
        };
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["sequence"], 1);
        assert_eq!(json["published"], false);
        assert_eq!(json["counters"]["car"], 4);
        assert_eq!(json["categories"][0]["category"], "car");
        assert_eq!(json["categories"][0]["entered"], 1);
        assert_eq!(json["categories"][2]["category"], "truck");
    }

    #[test]
    fn throttle_holds_back_early_publishes() {
        let supervisor = AcquisitionSupervisor::new(stub_source("stub://lot"), Duration::ZERO);
        let mut pipeline = OccupancyPipeline::new(
            supervisor,
            Box::new(StubBackend::scripted(vec![])),
            ParkingLot::default(),
            LogPublisher::new(),
            Duration::from_secs(3600),
        );
        pipeline.start();
        for _ in 0..3 {
            pipeline.run_once().unwrap();
        }
        assert_eq!(pipeline.publisher().published(), 0);
        assert_eq!(pipeline.stats().publishes, 0);
    }

    #[test]
    fn run_returns_once_stop_is_set() {
        let supervisor = AcquisitionSupervisor::new(stub_source("stub://lot"), Duration::ZERO);
        let mut pipeline = OccupancyPipeline::new(
            supervisor,
            Box::new(StubBackend::scripted(vec![])),
            ParkingLot::default(),
            LogPublisher::new(),
            Duration::ZERO,
        );
        pipeline.start();
        let stop = AtomicBool::new(true);
        let stats = pipeline.run(&stop);
        assert_eq!(stats.frames_processed, 0);
        pipeline.shutdown().unwrap();
        assert!(!pipeline.supervisor().is_connected());
    }
}
