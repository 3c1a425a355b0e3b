#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{category_for_class, Detection, DetectionResult};

/// Box coordinates (cx, cy, w, h) precede the class scores in each anchor column.
const BOX_ROWS: usize = 4;

/// Inference parameters for a YOLOv8-style ONNX export.
#[derive(Clone, Copy, Debug)]
pub struct TractSettings {
    /// Square model input side, in pixels.
    pub input_size: u32,
    /// Minimum class score to keep a box.
    pub confidence: f32,
    /// Boxes of the same class overlapping more than this are suppressed.
    pub iou_threshold: f32,
}

impl Default for TractSettings {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence: 0.25,
            iou_threshold: 0.45,
        }
    }
}

/// Tract-based backend for ONNX inference.
///
/// Loads a local YOLOv8 detection model and decodes its `[1, 4 + classes, anchors]`
/// output into boxes in frame pixels. Frames are resized to the model input
/// with nearest-neighbour sampling; no letterboxing.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    settings: TractSettings,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, settings: TractSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = settings.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, settings })
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        if pixels.len() != expected_len || expected_len == 0 {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let side = self.settings.input_size as usize;
        let (width, height) = (width as usize, height as usize);
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            let src_x = (x * width / side).min(width - 1);
            let src_y = (y * height / side).min(height - 1);
            pixels[(src_y * width + src_x) * 3 + c] as f32 / 255.0
        });

        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, width: u32, height: u32) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [batch, rows, anchors]")?;

        let (_, rows, anchors) = view.dim();
        if rows <= BOX_ROWS {
            return Err(anyhow!("model output has no class rows ({} rows)", rows));
        }

        let side = self.settings.input_size as f32;
        let sx = width as f32 / side;
        let sy = height as f32 / side;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let (class_id, score) = (BOX_ROWS..rows)
                .map(|row| (row - BOX_ROWS, view[(0, row, a)]))
                .fold((0usize, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if score < self.settings.confidence || category_for_class(class_id as u32).is_none() {
                continue;
            }

            let (cx, cy, w, h) = (
                view[(0, 0, a)],
                view[(0, 1, a)],
                view[(0, 2, a)],
                view[(0, 3, a)],
            );
            candidates.push(Detection::new(
                class_id as u32,
                ((cx - w / 2.0) * sx).clamp(0.0, width as f32),
                ((cy - h / 2.0) * sy).clamp(0.0, height as f32),
                ((cx + w / 2.0) * sx).clamp(0.0, width as f32),
                ((cy + h / 2.0) * sy).clamp(0.0, height as f32),
                score,
            ));
        }

        Ok(non_max_suppression(candidates, self.settings.iou_threshold))
    }
}

/// Greedy per-class suppression, highest confidence first.
fn non_max_suppression(mut boxes: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        Ok(DetectionResult::new(self.decode(outputs, width, height)?))
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.settings.input_size;
        let blank = vec![0u8; (side * side * 3) as usize];
        self.detect(&blank, side, side).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::COCO_CAR;

    #[test]
    fn nms_keeps_best_box_per_overlap() {
        let boxes = vec![
            Detection::new(COCO_CAR, 0.0, 0.0, 100.0, 100.0, 0.6),
            Detection::new(COCO_CAR, 2.0, 2.0, 102.0, 102.0, 0.9),
            Detection::new(COCO_CAR, 300.0, 300.0, 400.0, 400.0, 0.5),
        ];
        let kept = non_max_suppression(boxes, 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
    }
}
