//! Operator stop requests.
//!
//! The main loop polls a shared flag between iterations. Ctrl-C sets it, and
//! so does a `q` line typed on an interactive stdin.

use anyhow::{Context, Result};
use std::io::{BufRead, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag {
    requested: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Borrow the raw flag for loops that take `&AtomicBool`.
    pub fn as_atomic(&self) -> &AtomicBool {
        &self.requested
    }

    /// Route Ctrl-C to this flag. Only one handler may be installed per process.
    pub fn install_ctrlc(&self) -> Result<()> {
        let flag = self.clone();
        ctrlc::set_handler(move || {
            log::info!("shutdown signal received");
            flag.request();
        })
        .context("error setting Ctrl-C handler")
    }

    /// Watch stdin for a quit command when it is attached to a terminal.
    ///
    /// Returns `None` when stdin is not interactive. The watcher thread exits
    /// on the quit command or at end of input.
    pub fn watch_stdin(&self) -> Option<JoinHandle<()>> {
        if !std::io::stdin().is_terminal() {
            return None;
        }
        let flag = self.clone();
        Some(std::thread::spawn(move || {
            flag.watch_lines(std::io::stdin().lock());
        }))
    }

    fn watch_lines<R: BufRead>(&self, reader: R) {
        for line in reader.lines() {
            match line {
                Ok(line) if is_quit_command(&line) => {
                    log::info!("quit requested from console");
                    self.request();
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    log::debug!("stdin watcher stopped: {}", e);
                    return;
                }
            }
        }
    }
}

pub fn is_quit_command(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}
