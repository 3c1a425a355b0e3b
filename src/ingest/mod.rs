//! Frame ingestion.
//!
//! - `FrameSource`: the capture resource contract (connect, pull, stop)
//! - `rtsp`: RTSP cameras through GStreamer (feature: rtsp-gstreamer) with a
//!   synthetic `stub://` fallback
//! - `supervisor`: wraps a source and reinitialises it after failures
//!
//! Sources block in `next_frame` until a frame arrives or the stream fails.

use anyhow::Result;

use crate::frame::Frame;

pub mod rtsp;
mod supervisor;

pub use rtsp::{RtspConfig, RtspSource};
pub use supervisor::AcquisitionSupervisor;

/// Statistics for a frame source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

/// A capture resource that yields decoded frames.
pub trait FrameSource {
    /// Open (or reopen after `stop`) the underlying stream.
    fn connect(&mut self) -> Result<()>;

    /// Block for the next frame.
    ///
    /// `Ok(None)` means the stream produced nothing usable this time (for
    /// example a capture without a colour frame); the caller skips it.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the stream. Must be safe to call when already stopped.
    fn stop(&mut self);

    fn is_healthy(&self) -> bool;

    fn stats(&self) -> SourceStats;
}
