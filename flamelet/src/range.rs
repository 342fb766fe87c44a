use serde::{Deserialize, Serialize};

/// Absolute time window in epoch milliseconds, both ends inclusive.
/// An inverted window contains nothing, so requests with `start > end`
/// fall out as empty trees/series instead of errors.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
pub struct AbsoluteTimeRange {
    pub start: i64,
    pub end: i64,
}

impl AbsoluteTimeRange {
    pub const UNBOUNDED: AbsoluteTimeRange = AbsoluteTimeRange {
        start: i64::MIN,
        end: i64::MAX,
    };

    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

/// Window expressed as millisecond offsets from the start of a recording.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
pub struct RelativeTimeRange {
    pub start_millis: i64,
    pub end_millis: i64,
}

impl RelativeTimeRange {
    pub fn new(start_millis: i64, end_millis: i64) -> Self {
        Self {
            start_millis,
            end_millis,
        }
    }

    pub fn to_absolute(&self, recording_start: i64) -> AbsoluteTimeRange {
        AbsoluteTimeRange::new(
            recording_start + self.start_millis,
            recording_start + self.end_millis,
        )
    }

    pub fn duration_millis(&self) -> i64 {
        self.end_millis - self.start_millis
    }
}
