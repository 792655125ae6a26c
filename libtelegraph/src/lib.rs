pub mod async_util;
pub mod channels;
pub mod chart;
pub mod config;
pub mod logs;
pub mod message;
pub mod poll;
pub mod remote;
pub mod signals;
pub mod state_file_io;
pub mod status;
#[cfg(test)]
mod tests;
pub mod time_range;
pub mod util;
pub mod view_mode;

use std::collections::HashMap;
use std::sync::Arc;

use camino::Utf8PathBuf;
use tracing::{debug, error, info, trace, warn};
use web_time::Instant;

use crate::async_util::{perform_async_work, send_after};
use crate::channels::MessageChannels;
use crate::chart::{Axis, AxisRange, ChartBackend, RangeDebouncer, build_traces};
use crate::config::GraphConfig;
use crate::message::Message;
use crate::poll::PollScheduler;
use crate::remote::{
    ChannelKey, Completion, HttpRangeSource, IssuedRequest, QueryChannel, QueryError, RangeData,
    RangeParams, RangeRequest, RangeSource, RequestId, RequestIds, RequestWindow,
};
use crate::signals::{SignalId, SignalRegistry};
use crate::state_file_io::UserState;
use crate::status::{DataStatus, DataStatusTracker};
use crate::time_range::{GlobalTimeRange, TimeRange};
use crate::view_mode::{ViewContext, ViewMode, ViewModeController};

/// Everything behind one live chart.
///
/// All mutation goes through [`GraphState::update`]. Background work
/// (requests, timers) only ever reports back by sending a [`Message`].
pub struct GraphState {
    pub config: GraphConfig,
    registry: SignalRegistry,
    view: ViewModeController,
    global_range: GlobalTimeRange,
    query_channels: HashMap<ChannelKey, QueryChannel>,
    request_ids: RequestIds,
    poll: PollScheduler,
    /// Moves a LiveScroll axis between polls, runs only while polling in that mode
    scroll: PollScheduler,
    /// The user paused polling
    paused: bool,
    debouncer: RangeDebouncer,
    status: DataStatusTracker,
    chart: Box<dyn ChartBackend>,
    source: Arc<dyn RangeSource>,
    channels: MessageChannels,
    state_file: Option<Utf8PathBuf>,
}

impl GraphState {
    pub fn new(
        config: GraphConfig,
        source: Arc<dyn RangeSource>,
        chart: Box<dyn ChartBackend>,
    ) -> Self {
        Self {
            registry: SignalRegistry::new(),
            view: ViewModeController::new(config.view.clone()),
            global_range: GlobalTimeRange::new(),
            query_channels: HashMap::new(),
            request_ids: RequestIds::default(),
            poll: PollScheduler::new(config.poll.interval()),
            scroll: PollScheduler::with_tick(config.poll.scroll_interval(), || {
                Message::ScrollTick
            }),
            paused: false,
            debouncer: RangeDebouncer::new(),
            status: DataStatusTracker::new(&config.status),
            chart,
            source,
            channels: MessageChannels::new(),
            state_file: None,
            config,
        }
    }

    /// State talking to the HTTP endpoint named in the configuration.
    pub fn new_http(config: GraphConfig, chart: Box<dyn ChartBackend>) -> Self {
        let source = HttpRangeSource::new(config.server.url.clone(), config.server.request_timeout());
        info!("Using range endpoint at {}", source.server());
        Self::new(config, Arc::new(source), chart)
    }

    pub fn update(&mut self, message: Message) {
        match message {
            Message::AddSignal {
                id,
                display_name,
                color,
            } => {
                if !self.registry.add(id.clone(), display_name, color) {
                    debug!("{id} is already displayed");
                    return;
                }
                info!("Displaying {id}");
                self.redraw();
                if self.registry.len() == 1 && self.config.poll.autostart && !self.paused {
                    self.begin_polling();
                }
                let window = self.view.compute_request_window(&self.view_context());
                self.request_window(ChannelKey::Signal(id), window);
            }
            Message::RemoveSignal(id) => {
                if !self.registry.remove(&id) {
                    debug!("{id} is not displayed");
                    return;
                }
                info!("Removed {id}");
                self.query_channels.remove(&ChannelKey::Signal(id));
                self.redraw();
                if self.registry.is_empty() {
                    self.poll.stop();
                    self.sync_scroll_timer();
                    if let Some(channel) = self.query_channels.get_mut(&ChannelKey::Visible)
                        && let Some(params) = channel.drop_pending()
                    {
                        debug!("Dropping pending request for {}", params.window);
                    }
                    if !self.paused {
                        self.status.polling_stopped();
                    }
                }
            }
            Message::SetViewMode(mode) => {
                if let Err(e) = self.view.set_mode(mode) {
                    warn!("Ignoring view mode change: {e}");
                    return;
                }
                info!("View mode {mode}");
                self.apply_view_mode();
                self.sync_scroll_timer();
                self.request_visible();
            }
            Message::PollTick => {
                if self.paused {
                    return;
                }
                trace!("Poll tick");
                self.request_visible();
            }
            Message::ScrollTick => {
                if matches!(self.view.mode(), ViewMode::LiveScroll { .. }) {
                    self.apply_view_mode();
                }
            }
            Message::RangeResponse {
                channel,
                request_id,
                result,
            } => self.handle_range_response(channel, request_id, result),
            Message::UserRangeChanged { start, end } => {
                if let Some(generation) = self.debouncer.push(start, end) {
                    send_after(
                        self.channels.sender.clone(),
                        self.config.chart.debounce_ms,
                        Message::UserRangeSettled(generation),
                    );
                } else {
                    debug!("Ignoring unusable user range [{start}, {end}]");
                }
            }
            Message::UserRangeSettled(generation) => {
                let Some(range) = self.debouncer.settle(generation) else {
                    return;
                };
                info!("User moved the time axis to {range}");
                self.view.to_manual();
                self.sync_scroll_timer();
                self.request_window(ChannelKey::Visible, RequestWindow::from_range(range));
            }
            Message::StartPolling => {
                self.paused = false;
                if self.registry.is_empty() {
                    debug!("Polling starts with the first signal");
                    self.status.polling_stopped();
                    return;
                }
                self.begin_polling();
                self.request_visible();
            }
            Message::StopPolling => {
                info!("Polling paused");
                self.paused = true;
                self.poll.stop();
                self.sync_scroll_timer();
                self.status.paused();
            }
            Message::SaveStateFile(path) => self.save_state_file(path),
            Message::LoadStateFile(path) => self.load_state_file(path),
            Message::LoadState(state) => self.apply_user_state(state),
            Message::StateSaved(path) => {
                self.state_file = Some(path);
            }
            Message::Error(e) => {
                error!("{e:?}");
            }
        }
    }

    /// Process everything background tasks have reported so far.
    pub fn handle_async_messages(&mut self) {
        while let Some(msg) = self.channels.try_recv() {
            self.update(msg);
        }
    }

    /// Wait for the next message from a background task.
    pub async fn next_message(&mut self) -> Option<Message> {
        self.channels.recv().await
    }

    pub fn add_signal(
        &mut self,
        id: impl Into<SignalId>,
        display_name: impl Into<String>,
        color: impl Into<String>,
    ) {
        self.update(Message::AddSignal {
            id: id.into(),
            display_name: display_name.into(),
            color: color.into(),
        });
    }

    pub fn remove_signal(&mut self, id: impl Into<SignalId>) {
        self.update(Message::RemoveSignal(id.into()));
    }

    pub fn set_live(&mut self) {
        self.update(Message::SetViewMode(ViewMode::Live));
    }

    pub fn set_live_scroll(&mut self, window_seconds: f64) {
        self.update(Message::SetViewMode(ViewMode::LiveScroll { window_seconds }));
    }

    pub fn set_zoom(&mut self, start: f64, end: f64) {
        self.update(Message::SetViewMode(ViewMode::Zoom { start, end }));
    }

    pub fn set_show_all(&mut self) {
        self.update(Message::SetViewMode(ViewMode::ShowAll));
    }

    pub fn start_polling(&mut self) {
        self.update(Message::StartPolling);
    }

    pub fn stop_polling(&mut self) {
        self.update(Message::StopPolling);
    }

    /// To be called by the chart whenever the user pans or zooms.
    pub fn user_range_changed(&mut self, start: f64, end: f64) {
        self.update(Message::UserRangeChanged { start, end });
    }

    pub fn save_state(&mut self, path: impl Into<Utf8PathBuf>) {
        self.update(Message::SaveStateFile(path.into()));
    }

    pub fn load_state(&mut self, path: impl Into<Utf8PathBuf>) {
        self.update(Message::LoadStateFile(path.into()));
    }

    #[must_use]
    pub fn registry(&self) -> &SignalRegistry {
        &self.registry
    }

    #[must_use]
    pub fn view_mode(&self) -> ViewMode {
        self.view.mode()
    }

    #[must_use]
    pub fn global_range(&self) -> GlobalTimeRange {
        self.global_range
    }

    #[must_use]
    pub fn query_channel(&self, key: &ChannelKey) -> Option<&QueryChannel> {
        self.query_channels.get(key)
    }

    #[must_use]
    pub fn is_polling(&self) -> bool {
        self.poll.is_running()
    }

    #[must_use]
    pub fn is_scrolling(&self) -> bool {
        self.scroll.is_running()
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn data_status(&self) -> DataStatus {
        self.status.status_at(Instant::now())
    }

    /// Time extent of the last response that carried data.
    #[must_use]
    pub fn data_range(&self) -> Option<TimeRange> {
        self.status.data_range()
    }

    #[must_use]
    pub fn state_file(&self) -> Option<&Utf8PathBuf> {
        self.state_file.as_ref()
    }

    fn view_context(&self) -> ViewContext {
        ViewContext {
            global: self.global_range,
            latest_sample: self.registry.latest_sample_time(),
            visible: self.chart.visible_range(),
            now: util::unix_now_seconds(),
        }
    }

    fn begin_polling(&mut self) {
        info!("Polling every {}ms", self.config.poll.interval_ms);
        self.poll.start(self.channels.sender.clone());
        self.sync_scroll_timer();
        self.status.polling_started();
    }

    /// The scroll timer runs while polling in LiveScroll mode. It never
    /// touches the poll timer.
    fn sync_scroll_timer(&mut self) {
        if self.poll.is_running() && matches!(self.view.mode(), ViewMode::LiveScroll { .. }) {
            self.scroll.start(self.channels.sender.clone());
        } else {
            self.scroll.stop();
        }
    }

    fn redraw(&mut self) {
        self.chart.draw(&build_traces(&self.registry));
    }

    /// Put the time axis where the current mode wants it.
    fn apply_view_mode(&mut self) {
        if let Some(range) = self.view.axis_range(&self.view_context()) {
            self.chart.set_axis_range(Axis::Time, AxisRange::Fixed(range));
        }
        self.chart.set_axis_range(Axis::Value, AxisRange::Auto);
    }

    fn request_visible(&mut self) {
        let window = self.view.compute_request_window(&self.view_context());
        self.request_window(ChannelKey::Visible, window);
    }

    fn request_window(&mut self, key: ChannelKey, window: RequestWindow) {
        if key == ChannelKey::Visible && self.registry.is_empty() {
            return;
        }
        let params = RangeParams {
            window,
            viewport_width: self.chart.viewport_width(),
        };
        let channel = self.query_channels.entry(key.clone()).or_default();
        match channel.request(params, &mut self.request_ids) {
            Some(issued) => self.send_request(key, issued),
            None => trace!("Coalesced {window} on {key}"),
        }
    }

    fn send_request(&mut self, key: ChannelKey, issued: IssuedRequest) {
        let signal_ids = match &key {
            ChannelKey::Visible => self.registry.ids(),
            ChannelKey::Signal(id) => vec![id.clone()],
        };
        debug!("Request {} on {key}: {}", issued.id, issued.params.window);
        let request = RangeRequest::new(
            signal_ids,
            issued.params.window,
            issued.params.viewport_width,
        );
        let response = self.source.fetch(request);
        let sender = self.channels.sender.clone();
        perform_async_work(async move {
            let result = response.await;
            sender.send(Message::RangeResponse {
                channel: key,
                request_id: issued.id,
                result,
            });
        });
    }

    fn handle_range_response(
        &mut self,
        key: ChannelKey,
        request_id: RequestId,
        result: Result<RangeData, QueryError>,
    ) {
        let Some(channel) = self.query_channels.get_mut(&key) else {
            debug!("Dropping response {request_id} for closed channel {key}");
            return;
        };
        let completion = match &result {
            Ok(_) => channel.complete(request_id, &mut self.request_ids),
            Err(_) => channel.fail(request_id, &mut self.request_ids),
        };
        let follow_up = match completion {
            Completion::Stale => {
                debug!("Dropping stale response {request_id} on {key}");
                return;
            }
            Completion::Current { follow_up } => follow_up,
        };

        match result {
            Ok(data) => self.apply_range_data(&key, request_id, data),
            Err(e) => {
                warn!("Request {request_id} on {key} failed: {e}");
                self.status.no_data();
            }
        }

        if let Some(issued) = follow_up {
            self.send_request(key, issued);
        }
    }

    fn apply_range_data(&mut self, key: &ChannelKey, request_id: RequestId, mut data: RangeData) {
        let received = data.signals.len();
        let registry = &self.registry;
        data.signals.retain(|id, _| {
            let accepted = registry.accepts(id, request_id);
            if !accepted {
                debug!("Not applying {id} from {request_id}, newer data or no longer displayed");
            }
            accepted
        });
        let skipped = data.signals.len() < received;
        let bounds = data.time_bounds();
        for (id, samples) in data.signals {
            self.registry.replace_samples(&id, samples, request_id);
        }
        self.redraw();

        match bounds {
            Some(bounds) => {
                self.global_range.observe_range(bounds);
                self.status.data_received(Instant::now(), Some(bounds));
                self.apply_view_mode();
            }
            None if skipped => {
                debug!("Nothing new in response {request_id} on {key}");
            }
            None => {
                debug!("No data in response {request_id} on {key}");
                self.status.no_data();
            }
        }
    }

    fn apply_user_state(&mut self, state: UserState) {
        if let Err(e) = self.view.set_mode(state.view_mode) {
            error!("Not loading state: {e}");
            return;
        }
        info!(
            "Loading {} signals in {} mode",
            state.signals.len(),
            state.view_mode
        );
        self.poll.stop();
        self.sync_scroll_timer();
        self.registry.clear();
        self.query_channels.clear();
        self.paused = state.paused;
        if self.paused {
            self.status.paused();
        } else {
            self.status.polling_stopped();
        }
        self.redraw();
        for spec in state.signals {
            self.update(Message::AddSignal {
                id: spec.id,
                display_name: spec.display_name,
                color: spec.color,
            });
        }
        self.apply_view_mode();
    }
}
