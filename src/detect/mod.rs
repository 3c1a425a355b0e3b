//! Detection adapter.
//!
//! Backends produce classified boxes per frame; `DetectionResult::observations`
//! maps allowed classes onto vehicle categories and reduces boxes to centers.

mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::{TractBackend, TractSettings};
pub use registry::BackendRegistry;
pub use result::{
    category_for_class, Detection, DetectionResult, COCO_BICYCLE, COCO_BUS, COCO_CAR,
    COCO_MOTORCYCLE, COCO_TRUCK,
};
