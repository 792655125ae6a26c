//! Time windows and the running extent of observed sample times.
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Closed time interval in seconds.
#[derive(Debug, Display, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[display("[{start:.3}, {end:.3}]")]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// Create a range, swapping bounds if needed.
    #[must_use]
    pub fn new(mut start: f64, mut end: f64) -> Self {
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        Self { start, end }
    }

    #[must_use]
    pub fn span(&self) -> f64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.start.is_finite() && self.end.is_finite()
    }

    /// Finite bounds and a positive span.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.span() > 0.0
    }

    /// Both bounds moved outwards by `margin`.
    #[must_use]
    pub fn padded(&self, margin: f64) -> Self {
        Self {
            start: self.start - margin,
            end: self.end + margin,
        }
    }
}

/// Running `{min, max}` over every sample time seen so far.
///
/// The range only ever widens. It starts out empty, in which case no anchor
/// for data-relative view modes exists yet.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GlobalTimeRange {
    extent: Option<TimeRange>,
}

impl GlobalTimeRange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Widen the range to include `time`. Non-finite times are ignored.
    pub fn observe(&mut self, time: f64) {
        if !time.is_finite() {
            return;
        }
        self.extent = Some(match self.extent {
            None => TimeRange {
                start: time,
                end: time,
            },
            Some(extent) => TimeRange {
                start: extent.start.min(time),
                end: extent.end.max(time),
            },
        });
    }

    /// Widen the range to include both bounds of `range`.
    pub fn observe_range(&mut self, range: TimeRange) {
        self.observe(range.start);
        self.observe(range.end);
    }

    #[must_use]
    pub fn min(&self) -> Option<f64> {
        self.extent.map(|e| e.start)
    }

    #[must_use]
    pub fn max(&self) -> Option<f64> {
        self.extent.map(|e| e.end)
    }

    #[must_use]
    pub fn extent(&self) -> Option<TimeRange> {
        self.extent
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extent.is_none()
    }
}
