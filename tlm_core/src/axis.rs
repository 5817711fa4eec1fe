// Axis labelling, tick spacing and grid emphasis for telemetry plots.
//
// `configure_axis` only talks to the `PlotAxes` capability, so any plotting
// layer can be driven by it. `Panel` is the in-crate implementation, which
// records the settings and renders them through plotters.

use std::fmt;
use std::str::FromStr;

use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::TlmError;

pub const MAJOR_GRID_ALPHA: f64 = 0.8;
pub const MINOR_GRID_ALPHA: f64 = 0.4;

/// Upper bound on the number of ticks one call may generate.
pub const MAX_TICKS: usize = 100_000;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => f.write_str("x"),
            Axis::Y => f.write_str("y"),
        }
    }
}

impl FromStr for Axis {
    type Err = TlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            other => Err(TlmError::InvalidInput(format!(
                "axis must be 'x' or 'y' (got '{}')",
                other
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GridWhich {
    Major,
    Minor,
    Both,
}

/// The operations a plot handle must support to be configured.
pub trait PlotAxes {
    fn set_label(&mut self, axis: Axis, label: &str);
    fn set_limits(&mut self, axis: Axis, start: f64, end: f64);
    fn set_ticks(&mut self, axis: Axis, ticks: Vec<f64>, minor: bool);
    /// Turn on grid lines for `which`; `alpha` sets their opacity.
    fn grid(&mut self, which: GridWhich, alpha: Option<f64>);
}

/// Tick positions `start, start + step, ...` up to and including `end`.
pub fn tick_positions(start: f64, end: f64, step: f64) -> Result<Vec<f64>, TlmError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(TlmError::InvalidInput(format!(
            "tick step must be positive (got {})",
            step
        )));
    }
    if !start.is_finite() || !end.is_finite() || end < start {
        return Err(TlmError::InvalidInput(format!(
            "invalid axis range [{}, {}]",
            start, end
        )));
    }
    let span = ((end - start) / step + 1e-9).floor();
    if !span.is_finite() || span >= MAX_TICKS as f64 {
        return Err(TlmError::InvalidInput(format!(
            "step {} over [{}, {}] needs more than {} ticks",
            step, start, end, MAX_TICKS
        )));
    }
    let count = span as usize + 1;
    Ok((0..count).map(|k| start + k as f64 * step).collect())
}

/// Label, limit and tick one axis on every plot in `plots`, then turn on the
/// grid: major lines at [`MAJOR_GRID_ALPHA`], minor at [`MINOR_GRID_ALPHA`].
///
/// All arguments are checked before any plot is touched.
pub fn configure_axis<'a, P, I>(
    plots: I,
    axis: Axis,
    label: &str,
    range_start: f64,
    range_end: f64,
    major_step: f64,
    minor_step: Option<f64>,
) -> Result<(), TlmError>
where
    P: PlotAxes + ?Sized + 'a,
    I: IntoIterator<Item = &'a mut P>,
{
    let major_ticks = tick_positions(range_start, range_end, major_step)?;
    let minor_ticks = minor_step
        .map(|step| tick_positions(range_start, range_end, step))
        .transpose()?;

    let mut configured = 0usize;
    for plot in plots {
        plot.set_label(axis, label);
        plot.set_limits(axis, range_start, range_end);
        plot.set_ticks(axis, major_ticks.clone(), false);
        if let Some(ticks) = minor_ticks.as_ref() {
            plot.set_ticks(axis, ticks.clone(), true);
            plot.grid(GridWhich::Both, None);
            plot.grid(GridWhich::Minor, Some(MINOR_GRID_ALPHA));
        }
        plot.grid(GridWhich::Major, Some(MAJOR_GRID_ALPHA));
        configured += 1;
    }
    debug!(
        %axis,
        label,
        plots = configured,
        major = major_ticks.len(),
        minor = minor_ticks.as_ref().map_or(0, Vec::len),
        "configured axis"
    );
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AxisState {
    pub label: String,
    pub limits: Option<(f64, f64)>,
    pub major_ticks: Vec<f64>,
    pub minor_ticks: Vec<f64>,
}

impl AxisState {
    fn range(&self) -> (f64, f64) {
        match self.limits {
            Some((start, end)) if end > start => (start, end),
            Some((start, _)) => (start, start + 1.0),
            None => (0.0, 1.0),
        }
    }
}

/// Grid opacity per tick class; `None` means the grid is off.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GridState {
    pub major: Option<f64>,
    pub minor: Option<f64>,
}

/// A single chart panel driven through [`PlotAxes`] and drawn with plotters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Panel {
    pub x: AxisState,
    pub y: AxisState,
    pub grid: GridState,
}

impl Panel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(&self, axis: Axis) -> &AxisState {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }

    fn axis_mut(&mut self, axis: Axis) -> &mut AxisState {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
        }
    }

    /// Render the panel onto `root`, with `series` as a line on top of the grid.
    pub fn draw<DB>(
        &self,
        root: &DrawingArea<DB, Shift>,
        series: &[(f64, f64)],
    ) -> Result<(), TlmError>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let plot_err = |e: DrawingAreaErrorKind<DB::ErrorType>| TlmError::Plot(e.to_string());
        let (x0, x1) = self.x.range();
        let (y0, y1) = self.y.range();

        root.fill(&WHITE).map_err(plot_err)?;
        let mut chart = ChartBuilder::on(root)
            .margin(25)
            .set_label_area_size(LabelAreaPosition::Left, 50)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(plot_err)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(self.x.label.clone())
            .y_desc(self.y.label.clone())
            .x_labels(self.x.major_ticks.len().max(2))
            .y_labels(self.y.major_ticks.len().max(2))
            .x_label_formatter(&|v| format!("{:.0}", v))
            .y_label_formatter(&|v| format!("{:.0}", v))
            .draw()
            .map_err(plot_err)?;

        // minor first so major lines sit on top
        let passes = [
            (self.grid.minor, &self.x.minor_ticks, &self.y.minor_ticks),
            (self.grid.major, &self.x.major_ticks, &self.y.major_ticks),
        ];
        for (alpha, x_ticks, y_ticks) in passes {
            let Some(alpha) = alpha else { continue };
            let color = BLACK.mix(alpha);
            for &x in x_ticks {
                chart
                    .draw_series(LineSeries::new(vec![(x, y0), (x, y1)], &color))
                    .map_err(plot_err)?;
            }
            for &y in y_ticks {
                chart
                    .draw_series(LineSeries::new(vec![(x0, y), (x1, y)], &color))
                    .map_err(plot_err)?;
            }
        }

        if !series.is_empty() {
            chart
                .draw_series(LineSeries::new(series.iter().copied(), &RGBColor(200, 0, 100)))
                .map_err(plot_err)?;
        }

        root.present().map_err(plot_err)?;
        Ok(())
    }
}

impl PlotAxes for Panel {
    fn set_label(&mut self, axis: Axis, label: &str) {
        self.axis_mut(axis).label = label.to_string();
    }

    fn set_limits(&mut self, axis: Axis, start: f64, end: f64) {
        self.axis_mut(axis).limits = Some((start, end));
    }

    fn set_ticks(&mut self, axis: Axis, ticks: Vec<f64>, minor: bool) {
        let state = self.axis_mut(axis);
        if minor {
            state.minor_ticks = ticks;
        } else {
            state.major_ticks = ticks;
        }
    }

    fn grid(&mut self, which: GridWhich, alpha: Option<f64>) {
        let alpha = alpha.unwrap_or(1.0).clamp(0.0, 1.0);
        match which {
            GridWhich::Major => self.grid.major = Some(alpha),
            GridWhich::Minor => self.grid.minor = Some(alpha),
            GridWhich::Both => {
                self.grid.major = Some(alpha);
                self.grid.minor = Some(alpha);
            }
        }
    }
}
