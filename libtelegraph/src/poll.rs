//! Fixed rate tick sources driving range requests and axis scrolling.
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use crate::channels::MessageSender;
use crate::message::Message;
use crate::spawn;

/// Sends a tick message, [`Message::PollTick`] by default, every period
/// while running.
///
/// The period does not depend on how long requests take, overlapping ticks
/// are absorbed by request coalescing.
#[derive(Debug)]
pub struct PollScheduler {
    period: Duration,
    tick: fn() -> Message,
    task: Option<JoinHandle<()>>,
}

impl PollScheduler {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self::with_tick(period, || Message::PollTick)
    }

    #[must_use]
    pub fn with_tick(period: Duration, tick: fn() -> Message) -> Self {
        Self {
            period,
            tick,
            task: None,
        }
    }

    /// Start ticking. Does nothing if already running.
    pub fn start(&mut self, sender: MessageSender) {
        if self.is_running() {
            return;
        }
        let period = self.period;
        let tick = self.tick;
        debug!("Ticking every {}ms", period.as_millis());
        self.task = Some(spawn!(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if sender.is_closed() || !sender.send(tick()) {
                    break;
                }
            }
        }));
    }

    /// Stop ticking. Does nothing if not running.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Ticks stopped");
            task.abort();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
