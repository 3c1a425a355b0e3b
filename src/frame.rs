//! Decoded video frames.
//!
//! A `Frame` owns packed RGB pixels for one capture. Frames live for a single
//! loop iteration: acquired, handed to the detector, dropped.

use anyhow::{anyhow, Result};
use std::time::Instant;

use crate::detect::{DetectionResult, DetectorBackend};

/// One decoded RGB frame.
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Per-source capture counter, starting at 1.
    pub sequence: u64,
    captured_at: Instant,
}

impl Frame {
    /// Wrap packed RGB pixels. Fails when the buffer does not match the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "frame {}x{} expects {} RGB bytes, got {}",
                width,
                height,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        })
    }

    /// Seconds since capture, for latency logging.
    pub fn age_secs_f64(&self) -> f64 {
        self.captured_at.elapsed().as_secs_f64()
    }

    /// Run a detector over this frame.
    pub fn run_detector(&self, detector: &mut dyn DetectorBackend) -> Result<DetectionResult> {
        detector.detect(&self.data, self.width, self.height)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
