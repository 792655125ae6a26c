//! Coalescing and staleness bookkeeping for one logical stream of range
//! requests.
use derive_more::Display;
use tracing::debug;

use super::{RequestId, RequestIds, RequestWindow};
use crate::signals::SignalId;

/// Logical request stream. The visible window is shared by all signals,
/// every signal additionally gets its own stream for the initial fetch.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    #[display("visible")]
    Visible,
    #[display("signal {_0}")]
    Signal(SignalId),
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelStatus {
    #[default]
    Idle,
    Active,
    Inactive,
}

/// What to fetch, minus the signal ids which are resolved when the request
/// is actually issued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeParams {
    pub window: RequestWindow,
    pub viewport_width: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IssuedRequest {
    pub id: RequestId,
    pub params: RangeParams,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Completion {
    /// The outcome belongs to a superseded request and must not be applied.
    Stale,
    /// The outcome is current. `follow_up` is the coalesced request that
    /// was waiting and must now be sent.
    Current { follow_up: Option<IssuedRequest> },
}

#[derive(Debug, Default)]
pub struct QueryChannel {
    in_flight: bool,
    pending: Option<RangeParams>,
    latest_issued: Option<RequestId>,
    status: ChannelStatus,
}

impl QueryChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for `params`. Returns the request to send now, or `None` if a
    /// request is already in flight, in which case `params` replaces any
    /// previously pending request.
    pub fn request(&mut self, params: RangeParams, ids: &mut RequestIds) -> Option<IssuedRequest> {
        if self.in_flight {
            if self.pending.replace(params).is_some() {
                debug!("Replacing pending request with {}", params.window);
            }
            return None;
        }
        Some(self.issue(params, ids))
    }

    /// Record a successful response for `id`.
    pub fn complete(&mut self, id: RequestId, ids: &mut RequestIds) -> Completion {
        if self.is_stale(id) {
            return Completion::Stale;
        }
        self.status = ChannelStatus::Active;
        self.finish(ids)
    }

    /// Record a failed request. Failures are never retried; a waiting
    /// request is a new window and is sent right away.
    pub fn fail(&mut self, id: RequestId, ids: &mut RequestIds) -> Completion {
        if self.is_stale(id) {
            return Completion::Stale;
        }
        self.status = ChannelStatus::Inactive;
        self.finish(ids)
    }

    /// Forget the request waiting behind the one in flight.
    pub fn drop_pending(&mut self) -> Option<RangeParams> {
        self.pending.take()
    }

    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    #[must_use]
    pub fn pending(&self) -> Option<RangeParams> {
        self.pending
    }

    #[must_use]
    pub fn latest_issued(&self) -> Option<RequestId> {
        self.latest_issued
    }

    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        self.status
    }

    fn is_stale(&self, id: RequestId) -> bool {
        self.latest_issued.is_none_or(|latest| id < latest)
    }

    fn finish(&mut self, ids: &mut RequestIds) -> Completion {
        self.in_flight = false;
        let follow_up = self.pending.take().map(|params| self.issue(params, ids));
        Completion::Current { follow_up }
    }

    fn issue(&mut self, params: RangeParams, ids: &mut RequestIds) -> IssuedRequest {
        let id = ids.next();
        self.in_flight = true;
        self.latest_issued = Some(id);
        IssuedRequest { id, params }
    }
}
