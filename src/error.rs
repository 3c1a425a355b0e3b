//! Failure classification for the main loop.
//!
//! Setup code uses `anyhow`. Per-iteration failures are classified here so the
//! loop can route each domain to its own recovery: acquisition and detection
//! failures reinitialise the capture resource, publish failures are logged
//! and dropped.

/// Result type alias for one loop iteration.
pub type LoopResult<T> = std::result::Result<T, LoopError>;

/// Failure of a single main-loop iteration.
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// The frame source failed or is not connected.
    #[error("frame acquisition failed: {0:#}")]
    Acquisition(anyhow::Error),

    /// The detector failed on an acquired frame.
    #[error("detection failed: {0:#}")]
    Detection(anyhow::Error),

    /// Telemetry could not be handed to the transport.
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl LoopError {
    /// Whether recovery should tear down and reinitialise the capture resource.
    pub fn requires_capture_reset(&self) -> bool {
        matches!(self, LoopError::Acquisition(_) | LoopError::Detection(_))
    }
}

/// Telemetry publish failure. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("telemetry publish failed: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("telemetry publisher is closed")]
    Closed,

    #[error("telemetry publish failed: {0}")]
    Transport(String),
}
