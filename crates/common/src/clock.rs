//! Run clock used to stamp pipeline results.

use std::time::Instant;

/// Monotonic clock anchored at the moment a run started.
#[derive(Debug, Clone)]
pub struct RunClock {
    epoch: Instant,
}

impl RunClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Seconds elapsed since the run started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

/// Current wall-clock time as RFC 3339.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
