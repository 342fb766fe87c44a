use std::sync::Arc;

use fnv::FnvHashMap;
use regex::Regex;
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

use crate::error::TreeError;
use crate::range::AbsoluteTimeRange;
use crate::sample::{Sample, StackTrace};
use crate::traits::Mergeable;

/// Bucket width for timeseries accumulation. Sub-second widths are
/// clamped to at least one millisecond.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BucketGranularity {
    Second,
    Millis(u32),
}

impl BucketGranularity {
    fn width_millis(self) -> i64 {
        match self {
            BucketGranularity::Second => 1000,
            BucketGranularity::Millis(n) => i64::from(n.max(1)),
        }
    }

    /// Truncate a timestamp to the start of its bucket.
    pub fn bucket_of(self, timestamp: i64) -> i64 {
        let width = self.width_millis();
        timestamp.div_euclid(width) * width
    }
}

/// Bucketed counter values. Serializes as the sorted
/// `[[bucket, value], ...]` pair list the front end charts directly.
#[derive(Debug, Clone, Default)]
pub struct CounterSeries {
    buckets: FnvHashMap<i64, i64>,
}

impl CounterSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, bucket: i64, value: i64) {
        *self.buckets.entry(bucket).or_insert(0) += value;
    }

    /// Make sure a bucket exists without changing its value.
    pub fn touch(&mut self, bucket: i64) {
        self.buckets.entry(bucket).or_insert(0);
    }

    pub fn get(&self, bucket: i64) -> i64 {
        self.buckets.get(&bucket).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sorted (bucket, value) pairs.
    pub fn points(&self) -> Vec<(i64, i64)> {
        let mut points: Vec<(i64, i64)> = self.buckets.iter().map(|(k, v)| (*k, *v)).collect();
        points.sort_unstable_by_key(|p| p.0);
        points
    }

    /// Back-fill zero-valued buckets both ways so both series cover the
    /// same key set; side-by-side charts need aligned x axes.
    pub fn align_with(&mut self, other: &mut CounterSeries) {
        for &bucket in self.buckets.keys() {
            other.buckets.entry(bucket).or_insert(0);
        }
        for &bucket in other.buckets.keys() {
            self.buckets.entry(bucket).or_insert(0);
        }
    }
}

impl Mergeable for CounterSeries {
    fn merge(&mut self, other: &Self) -> &Self {
        for (bucket, value) in &other.buckets {
            self.add(*bucket, *value);
        }
        self
    }
}

impl Serialize for CounterSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let points = self.points();
        let mut seq = serializer.serialize_seq(Some(points.len()))?;
        for (bucket, value) in points {
            seq.serialize_element(&[bucket, value])?;
        }
        seq.end()
    }
}

/// Bucket each in-range event's extracted value. `time_shift` (millis) is
/// added to every timestamp before range-bounding, to correlate two
/// recordings with different start times.
pub fn aggregate<'a, I, F>(
    samples: I,
    value_of: F,
    range: AbsoluteTimeRange,
    granularity: BucketGranularity,
    time_shift: i64,
) -> CounterSeries
where
    I: IntoIterator<Item = &'a Sample>,
    F: Fn(&Sample) -> i64,
{
    let mut series = CounterSeries::new();
    for sample in samples {
        let timestamp = sample.timestamp + time_shift;
        if !range.contains(timestamp) {
            continue;
        }
        series.add(granularity.bucket_of(timestamp), value_of(sample));
    }
    series
}

/// Split aggregation into (unmatched, matched) series by a stack-content
/// pattern. Every bucket exists in both series so the chart can stack
/// them without gaps.
pub fn aggregate_searchable<'a, I, F>(
    samples: I,
    value_of: F,
    range: AbsoluteTimeRange,
    granularity: BucketGranularity,
    time_shift: i64,
    search_pattern: &str,
) -> Result<(CounterSeries, CounterSeries), TreeError>
where
    I: IntoIterator<Item = &'a Sample>,
    F: Fn(&Sample) -> i64,
{
    let pattern = Regex::new(&format!(".*{search_pattern}.*"))?;

    let mut values = CounterSeries::new();
    let mut matched = CounterSeries::new();
    for sample in samples {
        let timestamp = sample.timestamp + time_shift;
        if !range.contains(timestamp) {
            continue;
        }
        let bucket = granularity.bucket_of(timestamp);
        if stack_matches(&sample.stack, &pattern) {
            matched.add(bucket, value_of(sample));
            values.touch(bucket);
        } else {
            values.add(bucket, value_of(sample));
            matched.touch(bucket);
        }
    }
    Ok((values, matched))
}

fn stack_matches(stack: &Option<Arc<StackTrace>>, pattern: &Regex) -> bool {
    stack
        .as_ref()
        .is_some_and(|s| s.frames.iter().any(|f| pattern.is_match(&f.name)))
}

pub const SUBSECOND_CELL_MILLIS: i64 = 20;
pub const CELLS_PER_SECOND: usize = 50;

/// One second of the heatmap, one cell per 20 ms slot.
#[derive(Debug, Clone, Serialize, Eq, PartialEq)]
pub struct SecondColumn {
    pub cells: Vec<i64>,
}

impl SecondColumn {
    fn zeroed() -> Self {
        Self {
            cells: vec![0; CELLS_PER_SECOND],
        }
    }

    pub fn max_value(&self) -> i64 {
        self.cells.iter().copied().max().unwrap_or(0)
    }
}

/// Sub-second accumulator for heatmaps: columns are whole seconds since
/// the recording start, cells the sub-second slots. Tracks the maximum
/// cell value for color scaling.
#[derive(Debug, Clone, Serialize, Default, Eq, PartialEq)]
pub struct SubSecondSeries {
    pub columns: Vec<SecondColumn>,
    pub max_value: i64,
}

impl SubSecondSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `value` at `offset_millis` past the recording start. Events
    /// from before the start carry no slot and are ignored.
    pub fn record(&mut self, offset_millis: i64, value: i64) {
        if offset_millis < 0 {
            return;
        }
        let second = (offset_millis / 1000) as usize;
        let cell = ((offset_millis % 1000) / SUBSECOND_CELL_MILLIS) as usize;
        while self.columns.len() <= second {
            self.columns.push(SecondColumn::zeroed());
        }
        let slot = &mut self.columns[second].cells[cell];
        *slot += value;
        self.max_value = self.max_value.max(*slot);
    }
}

impl Mergeable for SubSecondSeries {
    fn merge(&mut self, other: &Self) -> &Self {
        while self.columns.len() < other.columns.len() {
            self.columns.push(SecondColumn::zeroed());
        }
        for (column, other_column) in self.columns.iter_mut().zip(&other.columns) {
            for (cell, other_cell) in column.cells.iter_mut().zip(&other_column.cells) {
                *cell += *other_cell;
                self.max_value = self.max_value.max(*cell);
            }
        }
        self
    }
}

/// Accumulate a heatmap from events, relative to the recording start.
pub fn aggregate_subsecond<'a, I, F>(samples: I, value_of: F, recording_start: i64) -> SubSecondSeries
where
    I: IntoIterator<Item = &'a Sample>,
    F: Fn(&Sample) -> i64,
{
    let mut series = SubSecondSeries::new();
    for sample in samples {
        series.record(sample.timestamp - recording_start, value_of(sample));
    }
    series
}
