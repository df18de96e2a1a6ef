use std::sync::Arc;

use tracing::{error, info};

use crate::{domain::Post, errors::Error, ports::ChatBackend, rooms::ChannelCache, Result};

/// Outbound half of the adapter: text to a channel, by channel name.
pub struct Sender {
    backend: Arc<dyn ChatBackend>,
    rooms: Arc<ChannelCache>,
}

impl Sender {
    pub fn new(backend: Arc<dyn ChatBackend>, rooms: Arc<ChannelCache>) -> Self {
        Self { backend, rooms }
    }

    /// Post `text` to the channel named `channel`. Failures are returned,
    /// never retried.
    pub async fn send(&self, text: &str, channel: &str) -> Result<()> {
        let Some(room) = self.rooms.resolve_by_name(channel).await else {
            error!(channel = %channel, "could not send message, channel not found");
            return Err(Error::ChannelNotFound(channel.to_string()));
        };

        // Message content may be sensitive; only the destination is logged.
        info!(channel = %channel, "sending message to channel");

        self.backend
            .create_post(&Post::outbound(room.id, text))
            .await
            .map_err(|e| {
                error!(channel = %channel, error = %e, "unable to create post");
                Error::External(format!("unable to create post: {e}"))
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dummy_room, dummy_team, Call, FakeBackend};

    fn sender(backend: FakeBackend) -> (Arc<FakeBackend>, Sender) {
        let backend = Arc::new(backend);
        let rooms = Arc::new(ChannelCache::new(backend.clone(), dummy_team().id));
        (backend.clone(), Sender::new(backend, rooms))
    }

    #[tokio::test]
    async fn send_posts_to_resolved_channel() {
        let (api, sender) = sender(FakeBackend::new());

        sender.send("Hello World", "Room 0").await.unwrap();

        assert_eq!(
            *api.posts.lock().unwrap(),
            vec![Post::outbound(dummy_room().id, "Hello World")]
        );
        assert_eq!(api.count(|c| *c == Call::CreatePost), 1);
    }

    #[tokio::test]
    async fn send_to_unknown_channel_posts_nothing() {
        let (api, sender) = sender(FakeBackend::new());

        let err = sender.send("hello", "unknown-channel").await.unwrap_err();

        assert!(matches!(err, Error::ChannelNotFound(ref c) if c == "unknown-channel"));
        assert_eq!(api.count(|c| *c == Call::CreatePost), 0);
    }

    #[tokio::test]
    async fn backend_rejection_is_wrapped_not_retried() {
        let mut backend = FakeBackend::new();
        backend.fail_create = true;
        let (api, sender) = sender(backend);

        let err = sender.send("hello", "Room 0").await.unwrap_err();

        assert!(err.to_string().contains("unable to create post"));
        assert!(err.to_string().contains("no permission"));
        assert_eq!(api.count(|c| *c == Call::CreatePost), 1);
    }

    #[tokio::test]
    async fn repeated_sends_resolve_once() {
        let (api, sender) = sender(FakeBackend::new());

        sender.send("one", "Room 0").await.unwrap();
        sender.send("two", "Room 0").await.unwrap();

        assert_eq!(api.count(|c| matches!(c, Call::GetChannelByName(..))), 1);
        assert_eq!(api.count(|c| *c == Call::CreatePost), 2);
    }
}
