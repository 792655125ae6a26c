
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::GraphState;
use crate::chart::{Axis, AxisRange, ChartBackend, Trace};
use crate::config::GraphConfig;
use crate::message::Message;
use crate::remote::{QueryError, RangeData, RangeRequest, RangeSource};
use crate::signals::Sample;
use crate::time_range::TimeRange;

pub(crate) type Reply = oneshot::Sender<Result<RangeData, QueryError>>;

/// Range source whose requests are answered by hand, in any order.
#[derive(Clone, Default)]
pub(crate) struct ScriptedSource {
    calls: Arc<Mutex<Vec<(RangeRequest, Reply)>>>,
}

impl ScriptedSource {
    pub fn outstanding(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn take(&self) -> Vec<(RangeRequest, Reply)> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn take_one(&self) -> (RangeRequest, Reply) {
        let mut calls = self.take();
        assert_eq!(calls.len(), 1, "expected exactly one outstanding request");
        calls.remove(0)
    }
}

impl RangeSource for ScriptedSource {
    fn fetch(&self, request: RangeRequest) -> BoxFuture<'static, Result<RangeData, QueryError>> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push((request, tx));
        async move {
            rx.await
                .unwrap_or_else(|_| Err(QueryError::Server("request dropped".to_string())))
        }
        .boxed()
    }
}

#[derive(Debug, Default)]
pub(crate) struct ChartLog {
    pub traces: Vec<Trace>,
    pub draws: usize,
    pub time_axis: Option<AxisRange>,
    pub value_axis: Option<AxisRange>,
    pub visible: Option<TimeRange>,
}

pub(crate) struct RecordingChart(Arc<Mutex<ChartLog>>);

impl ChartBackend for RecordingChart {
    fn draw(&mut self, traces: &[Trace]) {
        let mut log = self.0.lock().unwrap();
        log.traces = traces.to_vec();
        log.draws += 1;
    }

    fn set_axis_range(&mut self, axis: Axis, range: AxisRange) {
        let mut log = self.0.lock().unwrap();
        match axis {
            Axis::Time => {
                if let AxisRange::Fixed(r) = range {
                    log.visible = Some(r);
                }
                log.time_axis = Some(range);
            }
            Axis::Value => log.value_axis = Some(range),
        }
    }

    fn visible_range(&self) -> Option<TimeRange> {
        self.0.lock().unwrap().visible
    }

    fn viewport_width(&self) -> u32 {
        1000
    }
}

pub(crate) struct Harness {
    pub state: GraphState,
    pub source: ScriptedSource,
    pub chart: Arc<Mutex<ChartLog>>,
}

impl Harness {
    /// Polling is driven by hand unless `autostart` is set.
    pub fn new(autostart: bool) -> Self {
        let mut config = GraphConfig::builtin().unwrap();
        config.poll.autostart = autostart;
        let source = ScriptedSource::default();
        let chart = Arc::new(Mutex::new(ChartLog::default()));
        let state = GraphState::new(
            config,
            Arc::new(source.clone()),
            Box::new(RecordingChart(chart.clone())),
        );
        Self {
            state,
            source,
            chart,
        }
    }

    /// Feed messages into the state until `count` range responses were handled.
    pub async fn process_responses(&mut self, count: usize) {
        let mut seen = 0;
        while seen < count {
            let msg = self.state.next_message().await.unwrap();
            if matches!(msg, Message::RangeResponse { .. }) {
                seen += 1;
            }
            self.state.update(msg);
        }
    }

    /// Answer the only outstanding request with `data` and apply it.
    pub async fn answer_one(&mut self, data: RangeData) -> RangeRequest {
        let (request, reply) = self.source.take_one();
        reply.send(Ok(data)).unwrap();
        self.process_responses(1).await;
        request
    }

    pub fn time_axis(&self) -> Option<AxisRange> {
        self.chart.lock().unwrap().time_axis
    }
}

/// One sample per whole second in `[start, end]` for every requested signal.
pub(crate) fn series_for(request: &RangeRequest, start: f64, end: f64, value: f64) -> RangeData {
    let samples: Vec<_> = (start.ceil() as i64..=end.floor() as i64)
        .map(|t| Sample::new(t as f64, value))
        .collect();
    RangeData {
        signals: request
            .signal_ids
            .iter()
            .map(|id| (id.clone(), samples.clone()))
            .collect(),
    }
}
