//! Glue between the registry and whatever draws the chart.
use derive_more::Display;

use crate::signals::SignalRegistry;
use crate::time_range::TimeRange;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Time,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisRange {
    Fixed(TimeRange),
    /// Let the chart fit the axis to its data.
    Auto,
}

/// One drawable line.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub display_name: String,
    pub color: String,
}

/// The rendering library as seen from the controller.
pub trait ChartBackend: Send {
    /// Replace everything on the chart by `traces`.
    fn draw(&mut self, traces: &[Trace]);
    fn set_axis_range(&mut self, axis: Axis, range: AxisRange);
    /// Time range currently on screen, if the chart has one yet.
    fn visible_range(&self) -> Option<TimeRange>;
    /// Plot width in pixels, forwarded to the server as a downsampling hint.
    fn viewport_width(&self) -> u32;
}

/// Full snapshot of the registry in selection order.
#[must_use]
pub fn build_traces(registry: &SignalRegistry) -> Vec<Trace> {
    registry
        .iter()
        .map(|signal| {
            let (x, y) = signal.samples.iter().map(|s| (s.time, s.value)).unzip();
            Trace {
                x,
                y,
                display_name: signal.display_name.clone(),
                color: signal.color.clone(),
            }
        })
        .collect()
}

/// Collapses bursts of user axis changes into the last one.
///
/// Every accepted change bumps the generation. A timer armed for that
/// generation later calls [`RangeDebouncer::settle`], which only yields a
/// range if nothing newer arrived in the meantime.
#[derive(Debug, Default)]
pub struct RangeDebouncer {
    generation: u64,
    latest: Option<TimeRange>,
}

impl RangeDebouncer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user range. Returns the generation to arm a timer for, or
    /// `None` if the range is unusable.
    pub fn push(&mut self, lo: f64, hi: f64) -> Option<u64> {
        let range = TimeRange::new(lo, hi);
        if !range.is_valid() {
            return None;
        }
        self.generation += 1;
        self.latest = Some(range);
        Some(self.generation)
    }

    pub fn settle(&mut self, generation: u64) -> Option<TimeRange> {
        if generation != self.generation {
            return None;
        }
        self.latest.take()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
