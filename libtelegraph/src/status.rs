//! The "is data still flowing" indicator.
use std::time::Duration;

use derive_more::Display;
use web_time::Instant;

use crate::config::StatusConfig;
use crate::time_range::TimeRange;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataStatus {
    #[default]
    #[display("No Data")]
    Inactive,
    #[display("Receiving Data")]
    Receiving,
    #[display("Live Data")]
    Active,
    #[display("Slow Data")]
    Warning,
    Paused,
}

#[derive(Debug)]
pub struct DataStatusTracker {
    status: DataStatus,
    last_data: Option<Instant>,
    data_range: Option<TimeRange>,
    warning_after: Duration,
    inactive_after: Duration,
}

impl DataStatusTracker {
    #[must_use]
    pub fn new(config: &StatusConfig) -> Self {
        Self {
            status: DataStatus::Inactive,
            last_data: None,
            data_range: None,
            warning_after: Duration::from_millis(config.warning_after_ms),
            inactive_after: Duration::from_millis(config.inactive_after_ms),
        }
    }

    pub fn polling_started(&mut self) {
        self.status = DataStatus::Receiving;
    }

    pub fn polling_stopped(&mut self) {
        self.status = DataStatus::Inactive;
    }

    pub fn paused(&mut self) {
        self.status = DataStatus::Paused;
    }

    /// A response carrying samples arrived.
    pub fn data_received(&mut self, now: Instant, range: Option<TimeRange>) {
        self.last_data = Some(now);
        self.data_range = range;
        if self.status != DataStatus::Paused {
            self.status = DataStatus::Active;
        }
    }

    /// A request failed or came back without samples.
    pub fn no_data(&mut self) {
        if self.status != DataStatus::Paused {
            self.status = DataStatus::Inactive;
        }
    }

    /// Status as of `now`, downgraded when data stopped arriving.
    #[must_use]
    pub fn status_at(&self, now: Instant) -> DataStatus {
        match (self.status, self.last_data) {
            (DataStatus::Active, Some(last)) => {
                let quiet = now.saturating_duration_since(last);
                if quiet > self.inactive_after {
                    DataStatus::Inactive
                } else if quiet > self.warning_after {
                    DataStatus::Warning
                } else {
                    DataStatus::Active
                }
            }
            (status, _) => status,
        }
    }

    /// Time extent of the most recent response with data.
    #[must_use]
    pub fn data_range(&self) -> Option<TimeRange> {
        self.data_range
    }
}
