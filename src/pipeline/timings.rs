//! Stage timing telemetry.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Elapsed milliseconds per stage. `total` covers the whole job including
/// overhead not attributed to a named stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub load: u64,
    pub separation: u64,
    pub transcription: u64,
    pub total: u64,
}

impl Timings {
    /// Sum of the named stages.
    pub fn stage_sum(&self) -> u64 {
        self.load + self.separation + self.transcription
    }
}

/// Whole milliseconds since `start`, truncated.
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Run `f` and report how long it took.
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, u64) {
    let start = Instant::now();
    let value = f();
    (value, elapsed_ms(start))
}
