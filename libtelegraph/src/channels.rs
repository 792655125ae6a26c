use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::error;

use crate::message::Message;

/// Handle for background tasks to report back to the state.
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: UnboundedSender<Message>,
}

impl MessageSender {
    /// Returns `false` once the receiving state is gone.
    pub fn send(&self, msg: Message) -> bool {
        if let Err(e) = self.tx.send(msg) {
            error!("Failed to send message: {e}");
            return false;
        }
        true
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct MessageChannels {
    pub sender: MessageSender,
    receiver: UnboundedReceiver<Message>,
}

impl MessageChannels {
    #[must_use]
    pub fn new() -> Self {
        let (tx, receiver) = mpsc::unbounded_channel();
        Self {
            sender: MessageSender { tx },
            receiver,
        }
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Message> {
        match self.receiver.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl Default for MessageChannels {
    fn default() -> Self {
        Self::new()
    }
}
