//! Inbound event loop: server events in, canonical messages out.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::{
    brain::EventSink,
    domain::{Post, ReceiveMessageEvent, User, WebSocketEvent, EVENT_POSTED},
    rooms::ChannelCache,
};

pub struct EventConsumer {
    me: User,
    rooms: Arc<ChannelCache>,
    sink: Arc<dyn EventSink>,
}

impl EventConsumer {
    pub fn new(me: User, rooms: Arc<ChannelCache>, sink: Arc<dyn EventSink>) -> Self {
        Self { me, rooms, sink }
    }

    /// Drain `events` until the feed ends or `cancel` fires.
    ///
    /// Events still buffered when `cancel` fires are dropped.
    pub async fn run(
        &self,
        events: Option<mpsc::Receiver<WebSocketEvent>>,
        cancel: CancellationToken,
    ) {
        let Some(mut events) = events else {
            debug!("no event stream available");
            return;
        };

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("event loop cancelled");
                    return;
                }
                evt = events.recv() => match evt {
                    Some(evt) => self.handle_event(evt).await,
                    None => {
                        debug!("event stream closed");
                        return;
                    }
                },
            }
        }
    }

    pub async fn handle_event(&self, evt: WebSocketEvent) {
        if evt.event != EVENT_POSTED {
            trace!(event = %evt.event, "ignoring event");
            return;
        }

        let post = match decode_post(&evt) {
            Ok(post) => post,
            Err(reason) => {
                error!(seq = evt.seq, reason = %reason, "unable to parse post");
                return;
            }
        };

        if let Some(msg) = self.message_for_us(post).await {
            self.sink.emit(msg);
        }
    }

    async fn message_for_us(&self, post: Post) -> Option<ReceiveMessageEvent> {
        // Our own posts would otherwise loop straight back into the brain.
        if post.user_id == self.me.id {
            return None;
        }

        let channel = self.rooms.resolve_by_id(&post.channel_id).await?;

        let mention = self.me.mention();
        if !channel.is_direct() && !post.message.contains(&mention) {
            trace!(post_id = %post.id, channel = %channel.name, "not addressed to us");
            return None;
        }

        let text = post
            .message
            .strip_prefix(&mention)
            .unwrap_or(&post.message)
            .trim()
            .to_string();

        Some(ReceiveMessageEvent {
            text,
            channel: channel.name,
            author_id: post.user_id.clone(),
            id: post.id.clone(),
            data: post,
        })
    }
}

fn decode_post(evt: &WebSocketEvent) -> std::result::Result<Post, String> {
    match evt.data.get("post") {
        Some(Value::String(raw)) => serde_json::from_str(raw).map_err(|e| e.to_string()),
        Some(other) => Err(format!("post is not a string: {other}")),
        None => Err("event has no post".to_string()),
    }
}
