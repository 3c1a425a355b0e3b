use std::time::Duration;

use super::{FrameSource, SourceStats};
use crate::error::{LoopError, LoopResult};
use crate::frame::Frame;

/// Default pause between tearing a source down and reopening it.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Keeps a frame source alive across failures.
///
/// Failures never propagate past the main loop: `recover` stops the source,
/// waits `retry_delay`, and reopens it. A failed reopen is retried on the next
/// `recover`. There is no cap on attempts.
pub struct AcquisitionSupervisor<S: FrameSource> {
    source: S,
    retry_delay: Duration,
    connected: bool,
    failures: u64,
    recoveries: u64,
}

impl<S: FrameSource> AcquisitionSupervisor<S> {
    pub fn new(source: S, retry_delay: Duration) -> Self {
        Self {
            source,
            retry_delay,
            connected: false,
            failures: 0,
            recoveries: 0,
        }
    }

    /// Open the source and report whether it connected. A failure here is
    /// logged and left for `recover`.
    pub fn start(&mut self) -> bool {
        match self.source.connect() {
            Ok(()) => self.connected = true,
            Err(e) => {
                self.connected = false;
                log::warn!("frame source failed to open: {:#}", e);
            }
        }
        self.connected
    }

    /// Pull the next frame, blocking on the source.
    pub fn next_frame(&mut self) -> LoopResult<Option<Frame>> {
        if !self.connected {
            return Err(LoopError::Acquisition(anyhow::anyhow!(
                "frame source is not connected"
            )));
        }
        self.source.next_frame().map_err(LoopError::Acquisition)
    }

    /// Tear the source down, wait, and reopen it.
    pub fn recover(&mut self, cause: &LoopError) {
        self.failures += 1;
        log::warn!(
            "{}; reinitialising frame source in {:?} (failure #{})",
            cause,
            self.retry_delay,
            self.failures
        );
        self.source.stop();
        self.connected = false;

        std::thread::sleep(self.retry_delay);

        match self.source.connect() {
            Ok(()) => {
                self.connected = true;
                self.recoveries += 1;
                log::info!("frame source reinitialised");
            }
            Err(e) => {
                log::warn!("frame source reopen failed, will retry: {:#}", e);
            }
        }
    }

    /// Release the source for shutdown.
    pub fn stop(&mut self) {
        self.source.stop();
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_healthy(&self) -> bool {
        self.connected && self.source.is_healthy()
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }

    pub fn stats(&self) -> SourceStats {
        self.source.stats()
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};

    /// Source whose connect fails a set number of times, and whose pulls fail
    /// when `fail_pulls` is set.
    #[derive(Default)]
    struct FlakySource {
        connect_failures_left: u32,
        fail_pulls: bool,
        connects: u32,
        stops: u32,
        open: bool,
    }

    impl FrameSource for FlakySource {
        fn connect(&mut self) -> Result<()> {
            self.connects += 1;
            if self.connect_failures_left > 0 {
                self.connect_failures_left -= 1;
                return Err(anyhow!("device busy"));
            }
            self.open = true;
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.fail_pulls {
                return Err(anyhow!("stream stalled"));
            }
            Frame::new(vec![0u8; 3], 1, 1, 1).map(Some)
        }

        fn stop(&mut self) {
            self.stops += 1;
            self.open = false;
        }

        fn is_healthy(&self) -> bool {
            self.open
        }

        fn stats(&self) -> SourceStats {
            SourceStats::default()
        }
    }

    #[test]
    fn failed_start_is_not_fatal() {
        let source = FlakySource {
            connect_failures_left: 1,
            ..Default::default()
        };
        let mut supervisor = AcquisitionSupervisor::new(source, Duration::ZERO);
        assert!(!supervisor.start());
        assert!(!supervisor.is_connected());
        let err = supervisor.next_frame().unwrap_err();
        assert!(err.requires_capture_reset());
    }

    #[test]
    fn recover_stops_then_reconnects() {
        let mut supervisor = AcquisitionSupervisor::new(FlakySource::default(), Duration::ZERO);
        assert!(supervisor.start());
        let cause = LoopError::Acquisition(anyhow!("stream stalled"));
        supervisor.recover(&cause);

        assert!(supervisor.is_connected());
        assert_eq!(supervisor.source().stops, 1);
        assert_eq!(supervisor.source().connects, 2);
        assert_eq!(supervisor.failures(), 1);
        assert_eq!(supervisor.recoveries(), 1);
    }

    #[test]
    fn retries_are_unbounded() {
        let source = FlakySource {
            connect_failures_left: 25,
            ..Default::default()
        };
        let mut supervisor = AcquisitionSupervisor::new(source, Duration::ZERO);
        supervisor.start();
        let cause = LoopError::Acquisition(anyhow!("not connected"));
        while !supervisor.is_connected() {
            supervisor.recover(&cause);
        }
        assert_eq!(supervisor.failures(), 25);
        assert!(supervisor.next_frame().is_ok());
    }

    #[test]
    fn pull_failures_surface_as_acquisition_errors() {
        let source = FlakySource {
            fail_pulls: true,
            ..Default::default()
        };
        let mut supervisor = AcquisitionSupervisor::new(source, Duration::ZERO);
        supervisor.start();
        assert!(matches!(
            supervisor.next_frame(),
            Err(LoopError::Acquisition(_))
        ));
    }
}
