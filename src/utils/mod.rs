use std::time::{Duration, Instant};

use tracing::{debug, info};

/// Scope guard that reports a command's wall time when dropped.
pub struct Stopwatch {
    command: &'static str,
    begun: Instant,
}

impl Stopwatch {
    pub fn for_command(command: &'static str) -> Self {
        debug!("{} running", command);
        Self { command, begun: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.begun.elapsed()
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        info!("{} took {:.2?}", self.command, self.begun.elapsed());
    }
}
