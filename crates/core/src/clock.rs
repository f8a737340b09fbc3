use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<u64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}

/// A mutation timestamp: wall-clock milliseconds plus a sequence counter
/// that breaks ties within the same millisecond, so history entries
/// written by one engine always carry strictly increasing timestamps.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct Timestamp {
    wall_ms: u64,
    seq: u32,
}

impl Timestamp {
    pub fn new(wall_ms: u64, seq: u32) -> Self {
        Self { wall_ms, seq }
    }

    pub fn wall_ms(&self) -> u64 {
        self.wall_ms
    }

    pub fn seq(&self) -> u32 {
        self.seq
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wall_ms
            .cmp(&other.wall_ms)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A clock that generates monotonically increasing timestamps.
pub struct MonotonicClock {
    wall_ms: u64,
    seq: u32,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { wall_ms: 0, seq: 0 }
    }

    /// Generate the next monotonically increasing timestamp.
    pub fn tick(&mut self) -> Result<Timestamp, CoreError> {
        let now = physical_now()?;

        let ts = if now > self.wall_ms {
            Timestamp::new(now, 0)
        } else {
            Timestamp::new(self.wall_ms, self.seq + 1)
        };

        self.wall_ms = ts.wall_ms;
        self.seq = ts.seq;
        Ok(ts)
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
