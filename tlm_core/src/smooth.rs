// Window-kernel smoothing for single-channel logger signals.
// The signal is extended with reflected copies of itself at both ends before
// the convolution so the first and last samples are not dragged towards zero.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use ndarray::{s, Array1, ArrayBase, Data, Dimension, Ix1};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::TlmError;

/// Windows shorter than this leave the signal untouched.
pub const MIN_WINDOW_LEN: usize = 3;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    /// Plain moving average.
    Flat,
    #[default]
    Hanning,
    Hamming,
    Bartlett,
    Blackman,
}

impl WindowKind {
    pub const ALL: [WindowKind; 5] = [
        WindowKind::Flat,
        WindowKind::Hanning,
        WindowKind::Hamming,
        WindowKind::Bartlett,
        WindowKind::Blackman,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WindowKind::Flat => "flat",
            WindowKind::Hanning => "hanning",
            WindowKind::Hamming => "hamming",
            WindowKind::Bartlett => "bartlett",
            WindowKind::Blackman => "blackman",
        }
    }

    /// Evaluate the window at `len` points (unnormalized).
    pub fn kernel(&self, len: usize) -> Array1<f64> {
        if len == 0 {
            return Array1::zeros(0);
        }
        if len == 1 || *self == WindowKind::Flat {
            return Array1::ones(len);
        }
        let denom = (len - 1) as f64;
        Array1::from_iter((0..len).map(|n| {
            let phase = 2.0 * PI * n as f64 / denom;
            match self {
                WindowKind::Flat => 1.0,
                WindowKind::Hanning => 0.5 - 0.5 * phase.cos(),
                WindowKind::Hamming => 0.54 - 0.46 * phase.cos(),
                WindowKind::Bartlett => 1.0 - (2.0 * n as f64 / denom - 1.0).abs(),
                WindowKind::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
            }
        }))
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowKind {
    type Err = TlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindowKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                TlmError::InvalidInput(format!(
                    "window must be one of 'flat', 'hanning', 'hamming', 'bartlett', 'blackman' (got '{}')",
                    s
                ))
            })
    }
}

/// Smooth a 1-D signal by convolving a reflection-padded copy with a
/// normalized window of `window_len` points.
///
/// The output always has the same length as the input. Windows shorter than
/// [`MIN_WINDOW_LEN`] return the signal unchanged.
pub fn smooth<S, D>(
    signal: &ArrayBase<S, D>,
    window_len: usize,
    window: WindowKind,
) -> Result<Array1<f64>, TlmError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    if signal.ndim() != 1 {
        return Err(TlmError::InvalidInput(format!(
            "smooth only accepts 1-dimensional signals (got {} dimensions)",
            signal.ndim()
        )));
    }
    let x = signal
        .view()
        .into_dimensionality::<Ix1>()
        .map_err(|e| TlmError::InvalidInput(e.to_string()))?;
    if x.len() < window_len {
        return Err(TlmError::InvalidInput(format!(
            "signal of {} samples is shorter than the {}-point window",
            x.len(),
            window_len
        )));
    }
    if window_len < MIN_WINDOW_LEN {
        return Ok(x.to_owned());
    }

    let owned;
    let samples = match x.as_slice() {
        Some(samples) => samples,
        None => {
            owned = x.to_vec();
            &owned
        }
    };
    let padded = reflect_pad(samples, window_len);
    let kernel = window.kernel(window_len);
    let total = kernel.sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(TlmError::InvalidInput(format!(
            "{} window of length {} has no weight",
            window, window_len
        )));
    }
    // convolution, not correlation
    let flipped = kernel.slice(s![..;-1]).mapv(|w| w / total);
    let convolved: Array1<f64> = padded
        .windows(window_len)
        .into_iter()
        .map(|segment| segment.dot(&flipped))
        .collect();

    let n = x.len();
    let front = window_len / 2 - 1;
    debug!(
        window = %window,
        window_len,
        samples = n,
        padded = padded.len(),
        "smoothed signal"
    );
    Ok(convolved.slice(s![front..front + n]).to_owned())
}

/// Parse `window` by name and smooth with it.
pub fn smooth_named<S, D>(
    signal: &ArrayBase<S, D>,
    window_len: usize,
    window: &str,
) -> Result<Array1<f64>, TlmError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let kind = window.parse::<WindowKind>()?;
    smooth(signal, window_len, kind)
}

fn reflect_pad(x: &[f64], window_len: usize) -> Array1<f64> {
    let n = x.len();
    let mut padded = Vec::with_capacity(n + 2 * window_len - 2);
    // x[w], x[w-1], ..., x[1]; x[w] does not exist when n == w.
    padded.extend((1..=window_len).rev().map(|k| x[k.min(n - 1)]));
    padded.extend_from_slice(x);
    // x[n-2], x[n-3], ..., x[n-w+1]
    padded.extend((2..window_len).map(|k| x[n - k]));
    Array1::from_vec(padded)
}
