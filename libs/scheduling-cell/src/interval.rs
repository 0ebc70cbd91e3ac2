// libs/scheduling-cell/src/interval.rs
//
// Half-open time windows and the interval arithmetic behind conflict
// detection and availability. All occupancy is modelled as [start, end):
// a range ending at T and a range starting at T do not touch.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SchedulingError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SchedulingError> {
        if end <= start {
            return Err(SchedulingError::Validation(
                "Time range end must be after its start".to_string(),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn from_start_duration(
        start: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<Self, SchedulingError> {
        if duration_minutes <= 0 {
            return Err(SchedulingError::Validation(
                "Duration must be a positive number of minutes".to_string(),
            ));
        }
        Ok(Self {
            start,
            end: start + Duration::minutes(duration_minutes as i64),
        })
    }

    /// Single symmetric half-open overlap test. Subsumes "starts inside",
    /// "ends inside" and containment; back-to-back ranges do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Coalesce overlapping or adjacent ranges into a minimal sorted busy set.
pub fn merge_ranges(mut ranges: Vec<TimeRange>) -> Vec<TimeRange> {
    if ranges.is_empty() {
        return ranges;
    }

    ranges.sort_by(|a, b| a.start.cmp(&b.start));

    let mut merged: Vec<TimeRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            // Adjacent (end == start) ranges coalesce too.
            Some(last) if range.start <= last.end => {
                if range.end > last.end {
                    last.end = range.end;
                }
            }
            _ => merged.push(range),
        }
    }

    merged
}

/// Gaps of `window` not covered by `busy`. Expects `busy` already merged
/// and sorted; ranges outside the window are clipped to it.
pub fn subtract_ranges(window: TimeRange, busy: &[TimeRange]) -> Vec<TimeRange> {
    let mut free = Vec::new();
    let mut cursor = window.start;

    for range in busy {
        if range.end <= window.start || range.start >= window.end {
            continue;
        }
        if range.start > cursor {
            free.push(TimeRange {
                start: cursor,
                end: range.start.min(window.end),
            });
        }
        if range.end > cursor {
            cursor = range.end;
        }
    }

    if cursor < window.end {
        free.push(TimeRange {
            start: cursor,
            end: window.end,
        });
    }

    free
}

/// Cut a free range into consecutive fixed-size slots, dropping any
/// trailing remainder shorter than the granularity.
pub fn quantize(range: TimeRange, granularity_minutes: i32) -> Vec<TimeRange> {
    let step = Duration::minutes(granularity_minutes as i64);
    let mut slots = Vec::new();
    let mut cursor = range.start;

    while cursor + step <= range.end {
        slots.push(TimeRange {
            start: cursor,
            end: cursor + step,
        });
        cursor += step;
    }

    slots
}
