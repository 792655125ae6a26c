//! Viewing modes and the windows they ask for.
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ViewConfig;
use crate::remote::{MIN_ZOOM_LEVEL, RequestWindow, zoom_level_for};
use crate::time_range::{GlobalTimeRange, TimeRange};

#[derive(Debug, Display, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ViewMode {
    /// Rolling window ending at the newest data.
    #[default]
    Live,
    /// Window of fixed width ending at the newest buffered sample.
    #[display("LiveScroll({window_seconds}s)")]
    LiveScroll { window_seconds: f64 },
    /// Fixed range, never moved by new data.
    #[display("Zoom({start}, {end})")]
    Zoom { start: f64, end: f64 },
    /// The full observed history.
    ShowAll,
    /// Whatever the user panned or zoomed to.
    Manual,
}

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("Scroll window must be a positive number of seconds, got {0}")]
    InvalidWindow(f64),
    #[error("Zoom range must be finite with start < end, got [{start}, {end}]")]
    InvalidZoomRange { start: f64, end: f64 },
}

impl ViewMode {
    /// Check the payload of a mode coming from outside.
    pub fn validate(&self) -> Result<(), InputError> {
        match *self {
            ViewMode::LiveScroll { window_seconds }
                if !(window_seconds.is_finite() && window_seconds > 0.0) =>
            {
                Err(InputError::InvalidWindow(window_seconds))
            }
            ViewMode::Zoom { start, end }
                if !(start.is_finite() && end.is_finite() && start < end) =>
            {
                Err(InputError::InvalidZoomRange { start, end })
            }
            _ => Ok(()),
        }
    }
}

/// Everything the controller looks at besides its mode.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext {
    pub global: GlobalTimeRange,
    /// Newest sample currently held in any buffer
    pub latest_sample: Option<f64>,
    /// Time range the chart currently shows, if it reports one
    pub visible: Option<TimeRange>,
    /// Wall clock, seconds since the unix epoch
    pub now: f64,
}

#[derive(Debug)]
pub struct ViewModeController {
    mode: ViewMode,
    config: ViewConfig,
}

impl ViewModeController {
    #[must_use]
    pub fn new(config: ViewConfig) -> Self {
        Self {
            mode: ViewMode::default(),
            config,
        }
    }

    #[must_use]
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn set_live(&mut self) {
        self.mode = ViewMode::Live;
    }

    pub fn set_live_scroll(&mut self, window_seconds: f64) -> Result<(), InputError> {
        self.set_mode(ViewMode::LiveScroll { window_seconds })
    }

    pub fn set_zoom(&mut self, start: f64, end: f64) -> Result<(), InputError> {
        self.set_mode(ViewMode::Zoom { start, end })
    }

    pub fn set_show_all(&mut self) {
        self.mode = ViewMode::ShowAll;
    }

    /// The user took over the time axis.
    pub fn to_manual(&mut self) {
        self.mode = ViewMode::Manual;
    }

    /// Replace the mode. Invalid modes are rejected and leave the current one in place.
    pub fn set_mode(&mut self, mode: ViewMode) -> Result<(), InputError> {
        mode.validate()?;
        self.mode = mode;
        Ok(())
    }

    /// The window to fetch on this tick.
    #[must_use]
    pub fn compute_request_window(&self, ctx: &ViewContext) -> RequestWindow {
        let config = &self.config;
        match self.mode {
            ViewMode::Live => match ctx.global.max() {
                Some(max) => {
                    let end = max + config.live_buffer_seconds;
                    RequestWindow {
                        start: (end - 2.0 * config.live_window_seconds).max(0.0),
                        end,
                        zoom_level: config.live_zoom_level,
                    }
                }
                None => self.bootstrap_window(ctx.now),
            },
            ViewMode::LiveScroll { window_seconds } => match scroll_anchor(ctx) {
                Some(end) => RequestWindow::from_range(TimeRange::new(end - window_seconds, end)),
                None => self.bootstrap_window(ctx.now),
            },
            ViewMode::Zoom { start, end } => {
                let start = (start - config.zoom_margin_seconds).max(0.0);
                let end = end + config.zoom_margin_seconds;
                RequestWindow {
                    start,
                    end,
                    zoom_level: zoom_level_for(start, end).max(config.zoom_min_zoom_level),
                }
            }
            ViewMode::ShowAll => match self.show_all_range(&ctx.global) {
                Some(range) => RequestWindow {
                    start: range.start.max(0.0),
                    end: range.end,
                    zoom_level: MIN_ZOOM_LEVEL,
                },
                None => self.bootstrap_window(ctx.now),
            },
            ViewMode::Manual => {
                if let Some(visible) = ctx.visible.filter(TimeRange::is_valid) {
                    RequestWindow::from_range(visible)
                } else if let Some(max) = ctx.global.max() {
                    let start = (max - config.live_window_seconds).max(0.0);
                    RequestWindow::from_range(TimeRange::new(start, max))
                } else {
                    self.bootstrap_window(ctx.now)
                }
            }
        }
    }

    /// Where the time axis should be put, `None` to leave it alone.
    #[must_use]
    pub fn axis_range(&self, ctx: &ViewContext) -> Option<TimeRange> {
        let config = &self.config;
        match self.mode {
            ViewMode::Live => ctx.global.max().map(|max| TimeRange {
                start: (max - config.live_window_seconds).max(0.0),
                end: max + config.live_axis_padding_seconds,
            }),
            ViewMode::LiveScroll { window_seconds } => {
                scroll_anchor(ctx).map(|end| TimeRange::new(end - window_seconds, end))
            }
            ViewMode::Zoom { start, end } => Some(TimeRange { start, end }),
            ViewMode::ShowAll => self.show_all_range(&ctx.global),
            ViewMode::Manual => None,
        }
    }

    /// Before any sample is seen, ask for everything up to now so the first
    /// answer reveals where the data lives.
    fn bootstrap_window(&self, now: f64) -> RequestWindow {
        RequestWindow {
            start: 0.0,
            end: now.max(0.0) + self.config.live_buffer_seconds,
            zoom_level: MIN_ZOOM_LEVEL,
        }
    }

    fn show_all_range(&self, global: &GlobalTimeRange) -> Option<TimeRange> {
        let extent = global.extent()?;
        let margin = if extent.span() > 0.0 {
            extent.span() * self.config.show_all_margin_fraction.max(0.0)
        } else {
            // a single observed instant still gets a visible neighbourhood
            self.config.live_buffer_seconds
        };
        Some(extent.padded(margin))
    }
}

fn scroll_anchor(ctx: &ViewContext) -> Option<f64> {
    ctx.latest_sample.or(ctx.global.max())
}
