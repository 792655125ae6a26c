//! Code related to asynchronous features.
use futures::Future;
use tracing::trace;

use crate::channels::MessageSender;
use crate::message::Message;
use crate::spawn;

// Spawn an async task on the runtime.
pub fn perform_async_work<F>(f: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    spawn!(f);
}

pub async fn sleep_ms(delay_ms: u64) {
    tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
}

/// Deliver `msg` after `delay_ms`.
pub fn send_after(sender: MessageSender, delay_ms: u64, msg: Message) {
    perform_async_work(async move {
        sleep_ms(delay_ms).await;
        trace!("Timer of {delay_ms}ms elapsed");
        sender.send(msg);
    });
}

#[macro_export]
macro_rules! spawn {
    ($task:expr) => {
        tokio::spawn($task)
    };
}
