//! Parking occupancy estimator
//!
//! Counts free parking slots per vehicle category from a single camera view
//! and publishes the counters as telemetry.
//!
//! # Architecture
//!
//! Each loop iteration:
//!
//! 1. **Acquire**: pull a frame from the supervised source (RTSP or `stub://`).
//! 2. **Detect**: run a detector backend and keep car, motorcycle, bus and
//!    truck boxes, reduced to their centers.
//! 3. **Track**: per category, compare this frame's centers with last frame's
//!    by pixel proximity; unmatched new centers are entries, unmatched old
//!    centers are exits. The available counter moves by exits minus entries
//!    and is clamped to `0..=total`.
//! 4. **Publish**: at most every publish interval, send
//!    `"<car>,<motorcycle>,<truck>"` to the broker, fire-and-forget.
//!
//! There is no identity across frames. The estimate is only as stable as the
//! detector and drifts under occlusion or misdetection.
//!
//! # Module Structure
//!
//! - `occupancy`: categories, proximity matching, per-category trackers
//! - `detect`: detector backends and class-to-category mapping
//! - `ingest`: frame sources and the acquisition supervisor
//! - `telemetry`: publish throttle and MQTT publisher
//! - `pipeline`: the main loop and its recovery policy
//! - `config`: layered daemon configuration

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod occupancy;
pub mod pipeline;
pub mod shutdown;
pub mod telemetry;
pub mod ui;

pub use config::OccupancydConfig;
pub use detect::{BackendRegistry, Detection, DetectionResult, DetectorBackend, StubBackend};
pub use error::{LoopError, LoopResult, PublishError};
pub use frame::Frame;
pub use ingest::{AcquisitionSupervisor, FrameSource, RtspConfig, RtspSource, SourceStats};
pub use occupancy::{
    Category, Observations, OccupancyCounters, OccupancyTracker, ParkingLot, Point, SlotTotals,
    TrackerSettings,
};
pub use pipeline::{FrameReport, Iteration, OccupancyPipeline, PipelineStats};
pub use shutdown::ShutdownFlag;
pub use telemetry::{LogPublisher, MqttPublisher, MqttSettings, PublishThrottle, Publisher};
