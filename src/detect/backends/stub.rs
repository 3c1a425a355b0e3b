use anyhow::{anyhow, Result};
use rand::Rng;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionResult, COCO_BUS, COCO_CAR, COCO_MOTORCYCLE};

/// Frames per phase of the synthetic lot: arrivals, hold, departures, empty.
const SYNTHETIC_PHASE_FRAMES: u64 = 40;

/// Stub backend for testing and `stub://` sources.
///
/// Either replays a fixed script of per-frame detections (cycling when it
/// runs out) or synthesises a small lot where vehicles park, stay, and leave.
pub struct StubBackend {
    mode: StubMode,
    frame_count: u64,
}

enum StubMode {
    Scripted(Vec<Vec<Detection>>),
    SyntheticLot { jitter_px: f32 },
}

impl StubBackend {
    /// Synthetic lot with a couple of pixels of detector jitter.
    pub fn new() -> Self {
        Self {
            mode: StubMode::SyntheticLot { jitter_px: 2.0 },
            frame_count: 0,
        }
    }

    /// Replay `frames` in order, cycling.
    pub fn scripted(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            mode: StubMode::Scripted(frames),
            frame_count: 0,
        }
    }

    fn scripted_frame(frames: &[Vec<Detection>], index: u64) -> Vec<Detection> {
        if frames.is_empty() {
            return Vec::new();
        }
        frames[(index % frames.len() as u64) as usize].clone()
    }

    /// Number of occupied slots for a lot with `slots` spaces at `index`.
    ///
    /// Rises one vehicle at a time, holds, then empties one at a time.
    fn occupied(slots: u64, index: u64) -> u64 {
        let cycle = SYNTHETIC_PHASE_FRAMES * 4;
        let t = index % cycle;
        let step = SYNTHETIC_PHASE_FRAMES / slots.max(1);
        match t / SYNTHETIC_PHASE_FRAMES {
            0 => (t / step.max(1) + 1).min(slots),
            1 => slots,
            2 => slots.saturating_sub((t - 2 * SYNTHETIC_PHASE_FRAMES) / step.max(1) + 1),
            _ => 0,
        }
    }

    fn synthetic_frame(jitter_px: f32, index: u64, width: u32, height: u32) -> Vec<Detection> {
        // (class, row as fraction of height, box size in pixels, slots)
        let rows: [(u32, f32, f32, u64); 3] = [
            (COCO_CAR, 0.75, 80.0, 5),
            (COCO_MOTORCYCLE, 0.25, 40.0, 3),
            (COCO_BUS, 0.5, 110.0, 5),
        ];
        let mut rng = rand::thread_rng();
        let mut detections = Vec::new();
        for (class_id, row, size, slots) in rows {
            let spacing = width as f32 / (slots as f32 + 1.0);
            let cy = height as f32 * row;
            for slot in 0..Self::occupied(slots, index) {
                let cx = spacing * (slot as f32 + 1.0);
                let (jx, jy) = if jitter_px > 0.0 {
                    (
                        rng.gen_range(-jitter_px..=jitter_px),
                        rng.gen_range(-jitter_px..=jitter_px),
                    )
                } else {
                    (0.0, 0.0)
                };
                let half = size / 2.0;
                detections.push(Detection::new(
                    class_id,
                    (cx + jx - half).max(0.0),
                    (cy + jy - half).max(0.0),
                    cx + jx + half,
                    cy + jy + half,
                    0.9,
                ));
            }
        }
        detections
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        let expected = (width as usize) * (height as usize) * 3;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }

        let index = self.frame_count;
        self.frame_count += 1;

        let detections = match &self.mode {
            StubMode::Scripted(frames) => Self::scripted_frame(frames, index),
            StubMode::SyntheticLot { jitter_px } => {
                Self::synthetic_frame(*jitter_px, index, width, height)
            }
        };
        Ok(DetectionResult::new(detections))
    }
}
