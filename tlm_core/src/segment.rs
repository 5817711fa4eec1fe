// Splitting of logger tables into contiguous runs separated by time gaps
// (e.g. pit stops or logger restarts between stints).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::TlmError;

/// Largest time step (seconds) still considered part of the same run.
pub const DEFAULT_GAP_THRESHOLD_S: f64 = 0.5;

/// A row that carries a sample time.
pub trait Timestamped {
    fn time(&self) -> f64;
}

impl Timestamped for f64 {
    fn time(&self) -> f64 {
        *self
    }
}

impl<T: Timestamped + ?Sized> Timestamped for &T {
    fn time(&self) -> f64 {
        (**self).time()
    }
}

/// One logged sample: a time plus any number of named channel values.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TelemetryRow {
    pub time: f64,
    #[serde(default)]
    pub channels: BTreeMap<String, f64>,
}

impl TelemetryRow {
    pub fn new(time: f64) -> Self {
        Self {
            time,
            channels: BTreeMap::new(),
        }
    }

    pub fn with_channel(mut self, name: impl Into<String>, value: f64) -> Self {
        self.channels.insert(name.into(), value);
        self
    }

    pub fn channel(&self, name: &str) -> Option<f64> {
        self.channels.get(name).copied()
    }
}

impl Timestamped for TelemetryRow {
    fn time(&self) -> f64 {
        self.time
    }
}

/// Partition `rows` into contiguous groups, starting a new group wherever the
/// time step to the next row exceeds `gap_threshold`.
///
/// The groups borrow from `rows` and, concatenated in order, reproduce it
/// exactly. An empty table yields no groups.
pub fn split_by_gap<R: Timestamped>(
    rows: &[R],
    gap_threshold: f64,
) -> Result<Vec<&[R]>, TlmError> {
    let bounds = group_bounds(rows, gap_threshold)?;
    let groups: Vec<&[R]> = bounds
        .windows(2)
        .map(|pair| &rows[pair[0]..pair[1]])
        .collect();
    debug!(rows = rows.len(), groups = groups.len(), "split table on time gaps");
    Ok(groups)
}

/// Same partition as [`split_by_gap`], consuming the table into owned groups.
pub fn split_by_gap_owned<R: Timestamped>(
    rows: Vec<R>,
    gap_threshold: f64,
) -> Result<Vec<Vec<R>>, TlmError> {
    let bounds = group_bounds(&rows, gap_threshold)?;
    let mut groups = Vec::with_capacity(bounds.len().saturating_sub(1));
    let mut remaining = rows.into_iter();
    for pair in bounds.windows(2) {
        groups.push(remaining.by_ref().take(pair[1] - pair[0]).collect());
    }
    Ok(groups)
}

// Returns [0, starts..., len], or an empty list for an empty table.
fn group_bounds<R: Timestamped>(rows: &[R], gap_threshold: f64) -> Result<Vec<usize>, TlmError> {
    if !gap_threshold.is_finite() || gap_threshold < 0.0 {
        return Err(TlmError::InvalidInput(format!(
            "gap threshold must be a non-negative number (got {})",
            gap_threshold
        )));
    }
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    if !rows[0].time().is_finite() {
        return Err(TlmError::NonMonotonicTime { index: 0 });
    }

    let mut bounds = vec![0];
    let mut repeated = 0usize;
    for (idx, pair) in rows.windows(2).enumerate() {
        let next_time = pair[1].time();
        let delta = next_time - pair[0].time();
        if !next_time.is_finite() || delta < 0.0 {
            return Err(TlmError::NonMonotonicTime { index: idx + 1 });
        }
        if delta == 0.0 {
            repeated += 1;
        }
        if delta > gap_threshold {
            bounds.push(idx + 1);
        }
    }
    if repeated > 0 {
        warn!(repeated, "table contains repeated timestamps");
    }
    bounds.push(rows.len());
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    }

    fn uniform_rows(n: usize, step: f64) -> Vec<TelemetryRow> {
        (0..n)
            .map(|i| TelemetryRow::new(i as f64 * step).with_channel("rpm", 1000.0 + i as f64))
            .collect()
    }

    #[test]
    fn test_single_gap_splits_in_two() {
        init_tracing();
        let mut rows = uniform_rows(10, 0.1);
        for row in rows.iter_mut().skip(6) {
            row.time += 3.0;
        }
        let groups = split_by_gap(&rows, DEFAULT_GAP_THRESHOLD_S).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 6);
        assert_eq!(groups[1].len(), 4);
        assert_eq!(groups[1][0].channel("rpm"), Some(1006.0));
    }

    #[test]
    fn test_no_gap_gives_single_group() {
        let rows = uniform_rows(50, 0.5);
        let groups = split_by_gap(&rows, DEFAULT_GAP_THRESHOLD_S).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0], &rows[..]);
    }

    #[test]
    fn test_single_row() {
        let rows = vec![TelemetryRow::new(12.0)];
        let groups = split_by_gap(&rows, DEFAULT_GAP_THRESHOLD_S).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 1);
    }

    #[test]
    fn test_empty_table() {
        let rows: Vec<TelemetryRow> = Vec::new();
        assert!(split_by_gap(&rows, DEFAULT_GAP_THRESHOLD_S).unwrap().is_empty());
        assert!(split_by_gap_owned(rows, DEFAULT_GAP_THRESHOLD_S)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_partition_is_lossless() {
        let times = [0.0, 0.2, 0.4, 1.5, 1.6, 5.0, 9.0, 9.3, 9.7, 10.31];
        let groups = split_by_gap(&times, DEFAULT_GAP_THRESHOLD_S).unwrap();
        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![3, 2, 1, 3, 1]);
        let rejoined: Vec<f64> = groups.concat();
        assert_eq!(rejoined, times.to_vec());
    }

    #[test]
    fn test_gap_equal_to_threshold_stays_together() {
        let times = [0.0, 0.5, 1.0, 1.75];
        let groups = split_by_gap(&times, 0.5).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0], &[0.0, 0.5, 1.0]);
        assert_eq!(groups[1], &[1.75]);
    }

    #[test]
    fn test_gap_after_first_and_before_last_row() {
        let times = [0.0, 2.0, 2.1, 4.0];
        let groups = split_by_gap(&times, DEFAULT_GAP_THRESHOLD_S).unwrap();
        let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        assert_eq!(sizes, vec![1, 2, 1]);
    }

    #[test]
    fn test_owned_groups_match_borrowed() {
        let mut rows = uniform_rows(8, 0.25);
        rows[5].time = 10.0;
        rows[6].time = 10.25;
        rows[7].time = 10.5;
        let borrowed: Vec<Vec<TelemetryRow>> = split_by_gap(&rows, DEFAULT_GAP_THRESHOLD_S)
            .unwrap()
            .into_iter()
            .map(|g| g.to_vec())
            .collect();
        let mut owned = split_by_gap_owned(rows, DEFAULT_GAP_THRESHOLD_S).unwrap();
        assert_eq!(owned, borrowed);
        owned[0][0].time = -1.0;
        assert_eq!(borrowed[0][0].time, 0.0);
    }

    #[test]
    fn test_rejects_time_going_backwards() {
        let times = [0.0, 0.1, 0.05, 0.2];
        let err = split_by_gap(&times, DEFAULT_GAP_THRESHOLD_S).unwrap_err();
        assert!(matches!(err, TlmError::NonMonotonicTime { index: 2 }));
    }

    #[test]
    fn test_rejects_nan_time_and_bad_threshold() {
        let times = [0.0, f64::NAN];
        let err = split_by_gap(&times, DEFAULT_GAP_THRESHOLD_S).unwrap_err();
        assert!(matches!(err, TlmError::NonMonotonicTime { index: 1 }));
        let err = split_by_gap(&[0.0, 1.0], -0.5).unwrap_err();
        assert!(matches!(err, TlmError::InvalidInput(_)));
    }

    #[test]
    fn test_repeated_timestamps_are_accepted() {
        let times = [0.0, 0.0, 0.1, 0.1];
        let groups = split_by_gap(&times, DEFAULT_GAP_THRESHOLD_S).unwrap();
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn test_row_deserializes_without_channels() {
        let row: TelemetryRow = serde_json::from_str(r#"{"time": 1.25}"#).unwrap();
        assert_eq!(row, TelemetryRow::new(1.25));
    }
}
