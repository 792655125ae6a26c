//! The set of displayed signals and their buffered samples.
use derive_more::Display;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::remote::RequestId;

/// Stable key of a signal, `<message-type>.<field-name>`.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalId(String);

impl SignalId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SignalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SignalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

impl Sample {
    #[must_use]
    pub fn new(time: f64, value: f64) -> Self {
        Self { time, value }
    }
}

/// What the user selected, without any buffered data. This is what gets
/// persisted in state files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSpec {
    pub id: SignalId,
    pub display_name: String,
    pub color: String,
}

#[derive(Debug, Clone)]
pub struct Signal {
    pub id: SignalId,
    pub display_name: String,
    /// Display hint, passed through to the chart untouched
    pub color: String,
    /// Snapshot of the most recently applied window, time ascending
    pub samples: Vec<Sample>,
    /// Request whose response last replaced `samples`, on any channel
    pub last_request_id: Option<RequestId>,
}

impl Signal {
    #[must_use]
    pub fn spec(&self) -> SignalSpec {
        SignalSpec {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            color: self.color.clone(),
        }
    }

    #[must_use]
    pub fn last_sample_time(&self) -> Option<f64> {
        self.samples.last().map(|s| s.time)
    }
}

/// Registry of active signals in selection order.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    signals: IndexMap<SignalId, Signal>,
}

impl SignalRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a signal with an empty buffer. Returns `false` and leaves the
    /// registry untouched if the id is already present.
    pub fn add(&mut self, id: SignalId, display_name: String, color: String) -> bool {
        if self.signals.contains_key(&id) {
            return false;
        }
        self.signals.insert(
            id.clone(),
            Signal {
                id,
                display_name,
                color,
                samples: vec![],
                last_request_id: None,
            },
        );
        true
    }

    /// Returns `true` if the signal was present.
    pub fn remove(&mut self, id: &SignalId) -> bool {
        self.signals.shift_remove(id).is_some()
    }

    /// Whether a response to `request_id` may still replace the buffer of `id`.
    ///
    /// A response is too old once a later request was applied to the signal,
    /// whichever channel that request came through.
    #[must_use]
    pub fn accepts(&self, id: &SignalId, request_id: RequestId) -> bool {
        self.signals
            .get(id)
            .is_some_and(|signal| signal.last_request_id.is_none_or(|last| request_id >= last))
    }

    /// Swap the buffered window of `id` with the samples of response
    /// `request_id`. Unknown ids and older responses are ignored.
    ///
    /// Returns `true` if the buffer was replaced.
    pub fn replace_samples(
        &mut self,
        id: &SignalId,
        samples: Vec<Sample>,
        request_id: RequestId,
    ) -> bool {
        if !self.accepts(id, request_id) {
            return false;
        }
        let Some(signal) = self.signals.get_mut(id) else {
            return false;
        };
        signal.samples = samples;
        signal.last_request_id = Some(request_id);
        true
    }

    pub fn clear(&mut self) {
        self.signals.clear();
    }

    #[must_use]
    pub fn get(&self, id: &SignalId) -> Option<&Signal> {
        self.signals.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &SignalId) -> bool {
        self.signals.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<SignalId> {
        self.signals.keys().cloned().collect()
    }

    #[must_use]
    pub fn specs(&self) -> Vec<SignalSpec> {
        self.iter().map(Signal::spec).collect()
    }

    /// Most recent sample time over all buffers.
    ///
    /// This is the one place the "latest observed sample" is derived from the
    /// buffers; every view mode that needs it goes through here.
    #[must_use]
    pub fn latest_sample_time(&self) -> Option<f64> {
        self.iter()
            .filter_map(Signal::last_sample_time)
            .filter(|t| t.is_finite())
            .reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(ids: &[&str]) -> SignalRegistry {
        let mut registry = SignalRegistry::new();
        for id in ids {
            registry.add((*id).into(), id.to_string(), "#ff0000".to_string());
        }
        registry
    }

    #[test]
    fn adding_twice_keeps_one_entry() {
        let mut registry = SignalRegistry::new();
        assert!(registry.add("A.b".into(), "A.b".into(), "#123456".into()));
        assert!(!registry.add("A.b".into(), "other".into(), "#654321".into()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&"A.b".into()).unwrap().display_name, "A.b");
    }

    #[test]
    fn remove_and_replace_ignore_unknown_ids() {
        let mut registry = registry_with(&["A.b"]);
        assert!(!registry.remove(&"X.y".into()));
        assert!(!registry.replace_samples(&"X.y".into(), vec![Sample::new(1.0, 1.0)], RequestId(1)));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&"A.b".into()));
        assert!(registry.is_empty());
    }

    #[test]
    fn replace_swaps_instead_of_appending() {
        let mut registry = registry_with(&["A.b"]);
        let id = SignalId::from("A.b");
        registry.replace_samples(&id, vec![Sample::new(1.0, 1.0), Sample::new(2.0, 2.0)], RequestId(1));
        registry.replace_samples(&id, vec![Sample::new(5.0, 0.5)], RequestId(2));
        assert_eq!(registry.get(&id).unwrap().samples, vec![Sample::new(5.0, 0.5)]);
        assert_eq!(registry.get(&id).unwrap().last_request_id, Some(RequestId(2)));
    }

    #[test]
    fn older_response_does_not_replace_newer_buffer() {
        let mut registry = registry_with(&["A.b"]);
        let id = SignalId::from("A.b");
        assert!(registry.accepts(&id, RequestId(1)));
        assert!(registry.replace_samples(&id, vec![Sample::new(9.0, 7.0)], RequestId(4)));

        assert!(!registry.accepts(&id, RequestId(3)));
        assert!(!registry.replace_samples(&id, vec![Sample::new(1.0, 99.0)], RequestId(3)));
        assert_eq!(registry.get(&id).unwrap().samples, vec![Sample::new(9.0, 7.0)]);

        // a repeated answer to the same request is still current
        assert!(registry.replace_samples(&id, vec![Sample::new(10.0, 7.0)], RequestId(4)));
        assert!(!registry.accepts(&"X.y".into(), RequestId(5)));
    }

    #[test]
    fn latest_sample_time_spans_all_signals() {
        let mut registry = registry_with(&["A.b", "C.d", "E.f"]);
        registry.replace_samples(&"A.b".into(), vec![Sample::new(1.0, 0.0), Sample::new(9.0, 0.0)], RequestId(1));
        registry.replace_samples(&"C.d".into(), vec![Sample::new(4.0, 0.0), Sample::new(12.5, 0.0)], RequestId(1));
        assert_eq!(registry.latest_sample_time(), Some(12.5));
    }

    #[test]
    fn empty_buffers_have_no_latest_time() {
        let registry = registry_with(&["A.b"]);
        assert_eq!(registry.latest_sample_time(), None);
    }

    #[test]
    fn iteration_follows_selection_order() {
        let mut registry = registry_with(&["C.c", "A.a", "B.b"]);
        registry.remove(&"A.a".into());
        let ids = registry.ids();
        assert_eq!(ids, vec![SignalId::from("C.c"), SignalId::from("B.b")]);
    }
}
