//! Seams towards the bot brain.
//!
//! The brain itself (dispatch, handlers, storage) lives outside this crate.
//! It sees the adapter through [`ChatAdapter`] and receives inbound messages
//! through an [`EventSink`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::{domain::ReceiveMessageEvent, Result};

/// Where the adapter emits inbound messages.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ReceiveMessageEvent);
}

/// A chat adapter as seen by the brain.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Start delivering inbound messages to `sink`. Does not block.
    fn register_at(&self, sink: Arc<dyn EventSink>);

    async fn send(&self, text: &str, channel: &str) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// What a module gets to see and change while the brain is being set up.
pub struct BrainConfig {
    /// The bot's name.
    pub name: String,
    /// Lifetime of the brain; cancelled on shutdown.
    pub cancel: CancellationToken,
    pub span: Span,
    adapter: Option<Arc<dyn ChatAdapter>>,
}

impl BrainConfig {
    pub fn new(name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            name: name.into(),
            cancel,
            span: Span::current(),
            adapter: None,
        }
    }

    pub fn set_adapter(&mut self, adapter: Arc<dyn ChatAdapter>) {
        self.adapter = Some(adapter);
    }

    pub fn adapter(&self) -> Option<Arc<dyn ChatAdapter>> {
        self.adapter.clone()
    }
}

/// Module-registration hook.
#[async_trait]
pub trait Module: Send + Sync {
    async fn apply(&self, conf: &mut BrainConfig) -> Result<()>;
}

/// [`EventSink`] that forwards into an unbounded queue.
#[derive(Clone, Debug)]
pub struct QueueSink {
    tx: mpsc::UnboundedSender<ReceiveMessageEvent>,
}

impl QueueSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReceiveMessageEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for QueueSink {
    fn emit(&self, event: ReceiveMessageEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event queue closed; dropping message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Post;

    #[tokio::test]
    async fn queue_sink_forwards_events() {
        let (sink, mut rx) = QueueSink::new();
        sink.emit(ReceiveMessageEvent {
            text: "hi".to_string(),
            channel: "town-square".to_string(),
            author_id: "u1".to_string(),
            id: "p1".to_string(),
            data: Post::default(),
        });
        let got = rx.recv().await.unwrap();
        assert_eq!(got.text, "hi");
    }

    #[test]
    fn queue_sink_tolerates_closed_queue() {
        let (sink, rx) = QueueSink::new();
        drop(rx);
        sink.emit(ReceiveMessageEvent {
            text: String::new(),
            channel: String::new(),
            author_id: String::new(),
            id: String::new(),
            data: Post::default(),
        });
    }
}
