//! Range queries against the telemetry backend.
mod channel;
mod client;

use std::collections::HashMap;

use derive_more::Display;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::signals::{Sample, SignalId};
use crate::time_range::TimeRange;

pub use channel::{ChannelKey, ChannelStatus, Completion, IssuedRequest, QueryChannel, RangeParams};
pub use client::HttpRangeSource;

pub const VISIBLE_RANGE_ENDPOINT: &str = "get_visible_range";
pub const MIN_ZOOM_LEVEL: u8 = 1;
pub const MAX_ZOOM_LEVEL: u8 = 10;

/// Identifier of an issued range request. Strictly increasing over the
/// lifetime of a graph.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("#{_0}")]
pub struct RequestId(pub u64);

/// Source of fresh [`RequestId`]s, shared by all channels of one graph.
#[derive(Debug, Default)]
pub struct RequestIds {
    last: u64,
}

impl RequestIds {
    pub fn next(&mut self) -> RequestId {
        self.last += 1;
        RequestId(self.last)
    }
}

/// Downsampling density hint for a window, shorter windows ask for denser data.
#[must_use]
pub fn zoom_level_for(start: f64, end: f64) -> u8 {
    let span = (end - start).max(1.0);
    if !span.is_finite() {
        return MIN_ZOOM_LEVEL;
    }
    (100.0 / span)
        .floor()
        .clamp(f64::from(MIN_ZOOM_LEVEL), f64::from(MAX_ZOOM_LEVEL)) as u8
}

/// Time window to fetch plus its density hint.
#[derive(Debug, Display, Clone, Copy, PartialEq)]
#[display("[{start:.3}, {end:.3}] zoom {zoom_level}")]
pub struct RequestWindow {
    pub start: f64,
    pub end: f64,
    pub zoom_level: u8,
}

impl RequestWindow {
    /// Window over `range` with the density derived from its span.
    #[must_use]
    pub fn from_range(range: TimeRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
            zoom_level: zoom_level_for(range.start, range.end),
        }
    }
}

/// Request body of the visible range endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRequest {
    pub signal_ids: Vec<SignalId>,
    pub start_time: f64,
    pub end_time: f64,
    pub zoom_level: u8,
    pub viewport_width: u32,
}

impl RangeRequest {
    #[must_use]
    pub fn new(signal_ids: Vec<SignalId>, window: RequestWindow, viewport_width: u32) -> Self {
        Self {
            signal_ids,
            start_time: window.start,
            end_time: window.end,
            zoom_level: window.zoom_level,
            viewport_width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Compact per-signal arrays as sent by the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesData {
    #[serde(default)]
    pub x: Vec<f64>,
    #[serde(default)]
    pub y: Vec<f64>,
}

impl SeriesData {
    /// Pair up the arrays. Extra entries of the longer array and non-finite
    /// points are dropped.
    #[must_use]
    pub fn into_samples(self) -> Vec<Sample> {
        self.x
            .into_iter()
            .zip(self.y)
            .filter(|(t, v)| t.is_finite() && v.is_finite())
            .map(|(time, value)| Sample { time, value })
            .collect()
    }
}

/// Response body of the visible range endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeResponse {
    pub status: ResponseStatus,
    #[serde(default)]
    pub signals: HashMap<SignalId, SeriesData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RangeResponse {
    pub fn into_range_data(self) -> Result<RangeData, QueryError> {
        match self.status {
            ResponseStatus::Success => Ok(RangeData {
                signals: self
                    .signals
                    .into_iter()
                    .map(|(id, series)| (id, series.into_samples()))
                    .collect(),
            }),
            ResponseStatus::Error => Err(QueryError::Server(
                self.message
                    .unwrap_or_else(|| "no error message given".to_string()),
            )),
        }
    }
}

/// Successfully fetched window snapshot, one entry per signal the server
/// answered for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeData {
    pub signals: HashMap<SignalId, Vec<Sample>>,
}

impl RangeData {
    /// Time extent of all returned samples.
    #[must_use]
    pub fn time_bounds(&self) -> Option<TimeRange> {
        self.signals
            .values()
            .flat_map(|samples| samples.first().into_iter().chain(samples.last()))
            .map(|s| s.time)
            .fold(None, |bounds: Option<TimeRange>, t| {
                Some(match bounds {
                    None => TimeRange::new(t, t),
                    Some(b) => TimeRange::new(b.start.min(t), b.end.max(t)),
                })
            })
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unexpected response code: {0}")]
    UnexpectedStatus(reqwest::StatusCode),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Server error: {0}")]
    Server(String),
}

/// Anything that can answer range queries.
pub trait RangeSource: Send + Sync {
    fn fetch(&self, request: RangeRequest) -> BoxFuture<'static, Result<RangeData, QueryError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_level_follows_window_length() {
        assert_eq!(zoom_level_for(0.0, 10.0), 10);
        assert_eq!(zoom_level_for(0.0, 20.0), 5);
        assert_eq!(zoom_level_for(0.0, 60.0), 1);
        assert_eq!(zoom_level_for(0.0, 3600.0), 1);
        // sub-second windows are treated as one second
        assert_eq!(zoom_level_for(5.0, 5.2), 10);
        assert_eq!(zoom_level_for(5.0, 5.0), 10);
        assert_eq!(zoom_level_for(0.0, f64::INFINITY), 1);
    }

    #[test]
    fn request_ids_increase() {
        let mut ids = RequestIds::default();
        let a = ids.next();
        let b = ids.next();
        assert!(b > a);
        assert_eq!(a, RequestId(1));
    }

    #[test]
    fn request_body_uses_snake_case_fields() {
        let request = RangeRequest::new(
            vec!["BMS.soc".into()],
            RequestWindow {
                start: 5.0,
                end: 125.0,
                zoom_level: 3,
            },
            1200,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "signal_ids": ["BMS.soc"],
                "start_time": 5.0,
                "end_time": 125.0,
                "zoom_level": 3,
                "viewport_width": 1200
            })
        );
    }

    #[test]
    fn success_response_pairs_arrays_and_drops_bad_points() {
        let body = r#"{
            "status": "success",
            "signals": {
                "BMS.soc": {"x": [1.0, 2.0, 3.0], "y": [10.0, 20.0]},
                "MC.rpm": {"x": [], "y": []}
            }
        }"#;
        let response: RangeResponse = serde_json::from_str(body).unwrap();
        let data = response.into_range_data().unwrap();
        assert_eq!(
            data.signals[&SignalId::from("BMS.soc")],
            vec![Sample::new(1.0, 10.0), Sample::new(2.0, 20.0)]
        );
        assert!(data.signals[&SignalId::from("MC.rpm")].is_empty());
        assert_eq!(data.time_bounds(), Some(TimeRange::new(1.0, 2.0)));
    }

    #[test]
    fn error_response_becomes_server_error() {
        let body = r#"{"status": "error", "message": "Missing required parameters"}"#;
        let response: RangeResponse = serde_json::from_str(body).unwrap();
        let err = response.into_range_data().unwrap_err();
        assert!(matches!(err, QueryError::Server(ref m) if m == "Missing required parameters"));
    }

    #[test]
    fn empty_success_has_no_samples() {
        let response: RangeResponse = serde_json::from_str(r#"{"status": "success"}"#).unwrap();
        let data = response.into_range_data().unwrap();
        assert!(data.signals.is_empty());
        assert_eq!(data.time_bounds(), None);
    }
}
