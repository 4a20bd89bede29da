//! Evenly spaced sample timestamps over a bounded, offset-aware time range.

use chrono::{DateTime, FixedOffset, TimeDelta};
use core_types::TraceConfig;

use crate::errors::TraceError;

/// Validated `[start, end]` bounds plus sampling interval.
///
/// Both bounds carry an explicit UTC offset; there is no way to build a range from a
/// naive local time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    interval: TimeDelta,
}

impl TimeRange {
    pub fn new(
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        interval: TimeDelta,
    ) -> Result<Self, TraceError> {
        if start >= end {
            return Err(TraceError::InvalidRange {
                field: "end",
                reason: format!(
                    "start {} must be before end {}",
                    start.to_rfc3339(),
                    end.to_rfc3339()
                ),
            });
        }
        if interval <= TimeDelta::zero() {
            return Err(TraceError::InvalidRange {
                field: "interval",
                reason: format!("interval must be positive, got {interval}"),
            });
        }
        Ok(Self {
            start,
            end,
            interval,
        })
    }

    /// Parses RFC 3339 bounds. Timestamps without an offset are rejected.
    pub fn parse(start: &str, end: &str, interval: TimeDelta) -> Result<Self, TraceError> {
        Self::new(
            parse_bound("start", start)?,
            parse_bound("end", end)?,
            interval,
        )
    }

    pub fn from_config(config: &TraceConfig) -> Result<Self, TraceError> {
        let interval = TimeDelta::try_minutes(config.interval_minutes).ok_or_else(|| {
            TraceError::InvalidRange {
                field: "interval",
                reason: format!("{} minutes is out of range", config.interval_minutes),
            }
        })?;
        Self::parse(&config.start, &config.end, interval)
    }

    pub fn start(&self) -> DateTime<FixedOffset> {
        self.start
    }

    pub fn end(&self) -> DateTime<FixedOffset> {
        self.end
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// `floor((end - start) / interval) + 1`.
    pub fn point_count(&self) -> usize {
        let span = total_nanos(self.end - self.start);
        let step = total_nanos(self.interval);
        let steps = span / step;
        usize::try_from(steps + 1).unwrap_or(usize::MAX)
    }
}

fn parse_bound(field: &'static str, value: &str) -> Result<DateTime<FixedOffset>, TraceError> {
    DateTime::parse_from_rfc3339(value).map_err(|err| TraceError::InvalidRange {
        field,
        reason: format!("'{value}' is not an RFC 3339 timestamp with offset ({err})"),
    })
}

fn total_nanos(delta: TimeDelta) -> i128 {
    delta.num_seconds() as i128 * 1_000_000_000 + delta.subsec_nanos() as i128
}

/// Upper bound on up-front allocation; longer grids grow as they are built.
const MAX_PREALLOCATED_POINTS: usize = 1 << 20;

fn capacity_hint(range: &TimeRange) -> usize {
    range.point_count().min(MAX_PREALLOCATED_POINTS)
}

/// Strictly increasing timestamps, `interval` apart, starting at the range start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeGrid {
    points: Vec<DateTime<FixedOffset>>,
    interval: TimeDelta,
}

impl TimeGrid {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    pub fn points(&self) -> &[DateTime<FixedOffset>] {
        &self.points
    }

    pub fn first(&self) -> Option<DateTime<FixedOffset>> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<DateTime<FixedOffset>> {
        self.points.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DateTime<FixedOffset>> {
        self.points.iter()
    }
}

/// Steps from `start` by `interval` while the point is `<= end`. The end is included
/// when it lands on the grid; a trailing partial step is never emitted.
pub fn build_grid(range: &TimeRange) -> TimeGrid {
    let mut points = Vec::with_capacity(capacity_hint(range));
    let mut current = range.start;
    while current <= range.end {
        points.push(current);
        // A step past chrono's representable range is necessarily past `end`.
        match current.checked_add_signed(range.interval) {
            Some(next) => current = next,
            None => break,
        }
    }
    TimeGrid {
        points,
        interval: range.interval,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: &str, end: &str, minutes: i64) -> TimeRange {
        TimeRange::parse(start, end, TimeDelta::minutes(minutes)).unwrap()
    }

    #[test]
    fn hour_at_fifteen_minutes_has_five_points() {
        let grid = build_grid(&range("2020-01-01T00:00:00Z", "2020-01-01T01:00:00Z", 15));
        let labels = grid
            .iter()
            .map(|ts| ts.format("%H:%M").to_string())
            .collect::<Vec<_>>();
        assert_eq!(labels, ["00:00", "00:15", "00:30", "00:45", "01:00"]);
    }

    #[test]
    fn unaligned_end_drops_partial_step() {
        let r = range("2020-01-01T00:00:00Z", "2020-01-01T01:10:00Z", 15);
        let grid = build_grid(&r);
        assert_eq!(grid.len(), 5);
        assert_eq!(r.point_count(), 5);
        assert_eq!(grid.last().unwrap().to_rfc3339(), "2020-01-01T01:00:00+00:00");
    }

    #[test]
    fn interval_longer_than_range_yields_start_only() {
        let grid = build_grid(&range("2020-01-01T00:00:00Z", "2020-01-01T00:10:00Z", 15));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn reference_run_point_count() {
        let r = range("2012-12-31T23:00:00Z", "2016-12-30T22:45:00Z", 15);
        let grid = build_grid(&r);
        assert_eq!(grid.len(), 140_160);
        assert_eq!(grid.len(), r.point_count());
    }

    #[test]
    fn oversized_range_saturates_without_overallocating() {
        let r = TimeRange::parse(
            "0001-01-01T00:00:00Z",
            "9999-12-31T23:59:59Z",
            TimeDelta::nanoseconds(1),
        )
        .unwrap();
        assert_eq!(r.point_count(), usize::MAX);
        assert_eq!(capacity_hint(&r), MAX_PREALLOCATED_POINTS);

        let reference = range("2012-12-31T23:00:00Z", "2016-12-30T22:45:00Z", 15);
        assert_eq!(capacity_hint(&reference), 140_160);
    }

    #[test]
    fn offsets_compare_as_instants() {
        let r = range("2020-01-01T02:00:00+02:00", "2020-01-01T01:00:00Z", 30);
        let grid = build_grid(&r);
        assert_eq!(grid.len(), 3);
        assert_eq!(grid.first().unwrap().offset().local_minus_utc(), 7200);
    }

    #[test]
    fn points_are_strictly_increasing() {
        let grid = build_grid(&range("2020-03-01T00:00:00Z", "2020-03-02T00:00:00Z", 7));
        assert!(grid.points().windows(2).all(|w| w[1] - w[0] == TimeDelta::minutes(7)));
    }

    #[test]
    fn rejects_reversed_and_empty_ranges() {
        for (start, end) in [
            ("2020-01-01T01:00:00Z", "2020-01-01T00:00:00Z"),
            ("2020-01-01T00:00:00Z", "2020-01-01T00:00:00Z"),
        ] {
            let err = TimeRange::parse(start, end, TimeDelta::minutes(15)).unwrap_err();
            assert!(matches!(err, TraceError::InvalidRange { field: "end", .. }));
        }
    }

    #[test]
    fn rejects_non_positive_interval() {
        for minutes in [0, -15] {
            let err = TimeRange::parse(
                "2020-01-01T00:00:00Z",
                "2020-01-01T01:00:00Z",
                TimeDelta::minutes(minutes),
            )
            .unwrap_err();
            assert!(matches!(err, TraceError::InvalidRange { field: "interval", .. }));
        }
    }

    #[test]
    fn rejects_naive_timestamps() {
        let err = TimeRange::parse(
            "2020-01-01T00:00:00",
            "2020-01-01T01:00:00Z",
            TimeDelta::minutes(15),
        )
        .unwrap_err();
        assert!(matches!(err, TraceError::InvalidRange { field: "start", .. }));
    }
}
