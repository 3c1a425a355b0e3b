use anyhow::Result;

use crate::detect::result::DetectionResult;

/// Detector backend trait.
///
/// A backend turns one RGB frame into a list of classified boxes. What runs
/// inside (a model, a script, a remote service) is the backend's business;
/// the tracker only consumes the boxes.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// `pixels` is packed RGB, `width * height * 3` bytes. Boxes are returned
    /// in the same pixel space as the input frame.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionResult>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
