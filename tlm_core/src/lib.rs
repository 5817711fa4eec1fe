use ndarray::{Array1, ArrayBase, Data, Dimension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod axis;
pub mod channel;
pub mod gear;
pub mod segment;
pub mod smooth;

pub use axis::{configure_axis, tick_positions, Axis, GridWhich, Panel, PlotAxes};
pub use channel::{estimate_sample_rate, with_neighbors, WithNeighbors};
pub use gear::{estimate_gear, Gear, GearEstimate, GearTable};
pub use segment::{
    split_by_gap, split_by_gap_owned, TelemetryRow, Timestamped, DEFAULT_GAP_THRESHOLD_S,
};
pub use smooth::{smooth, smooth_named, WindowKind};

#[derive(Error, Debug)]
pub enum TlmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("insufficient data")]
    InsufficientData,
    #[error("gear index {index} is not in the gear table")]
    UnknownGear { index: u32 },
    #[error("time channel is not monotonic at row {index}")]
    NonMonotonicTime { index: usize },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("plotting error: {0}")]
    Plot(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Params {
    pub smooth_window_len: usize,
    pub smooth_window: WindowKind,
    pub gap_threshold_s: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            smooth_window_len: 11,
            smooth_window: WindowKind::Hanning,
            gap_threshold_s: DEFAULT_GAP_THRESHOLD_S,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), TlmError> {
        if !self.gap_threshold_s.is_finite() || self.gap_threshold_s < 0.0 {
            return Err(TlmError::InvalidInput(format!(
                "gap_threshold_s must be a non-negative number (got {})",
                self.gap_threshold_s
            )));
        }
        Ok(())
    }
}

/// Smooth `signal` with the window configured in `params`.
pub fn smooth_with<S, D>(signal: &ArrayBase<S, D>, params: &Params) -> Result<Array1<f64>, TlmError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    params.validate()?;
    smooth(signal, params.smooth_window_len, params.smooth_window)
}

/// Split `rows` on time gaps larger than `params.gap_threshold_s`.
pub fn split_with<'a, R: Timestamped>(
    rows: &'a [R],
    params: &Params,
) -> Result<Vec<&'a [R]>, TlmError> {
    params.validate()?;
    split_by_gap(rows, params.gap_threshold_s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_defaults_fill_missing_fields() {
        let params: Params = serde_json::from_str(r#"{"smooth_window": "blackman"}"#).unwrap();
        assert_eq!(params.smooth_window, WindowKind::Blackman);
        assert_eq!(params.smooth_window_len, 11);
        assert_eq!(params.gap_threshold_s, 0.5);
    }

    #[test]
    fn test_params_validate() {
        let mut params = Params::default();
        assert!(params.validate().is_ok());
        params.gap_threshold_s = f64::INFINITY;
        assert!(matches!(params.validate(), Err(TlmError::InvalidInput(_))));
    }

    #[test]
    fn test_entry_points_use_params() {
        let params = Params {
            smooth_window_len: 5,
            smooth_window: WindowKind::Flat,
            gap_threshold_s: 1.0,
        };
        let signal = Array1::from_elem(12, 3.0);
        let smoothed = smooth_with(&signal, &params).unwrap();
        assert_eq!(smoothed.len(), 12);

        let times = [0.0, 0.8, 1.6, 3.0];
        let groups = split_with(&times, &params).unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_error_messages() {
        let err = TlmError::UnknownGear { index: 9 };
        assert_eq!(err.to_string(), "gear index 9 is not in the gear table");
    }
}
