use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{Channel, Post, Team, User, WebSocketEvent},
    Result,
};

/// Hexagonal port for the chat server.
///
/// Only the calls the adapter actually makes. `etag` is forwarded as a
/// conditional-request tag; the adapter always passes an empty one.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn create_post(&self, post: &Post) -> Result<Post>;

    /// Identity of the authenticated account; fails if the token is invalid.
    async fn get_me(&self, etag: &str) -> Result<User>;

    /// Start listening and hand out the event feed.
    ///
    /// The receiver can be taken once; it yields `None` when the connection
    /// ends. Returns `None` if there is no feed to hand out.
    async fn event_stream(&self) -> Option<mpsc::Receiver<WebSocketEvent>>;

    async fn get_channel(&self, channel_id: &str, etag: &str) -> Result<Channel>;

    async fn get_channel_by_name(&self, name: &str, team_id: &str, etag: &str)
        -> Result<Channel>;

    async fn get_team_by_name(&self, name: &str, etag: &str) -> Result<Team>;

    /// Close the real-time connection and log out.
    async fn close(&self) -> Result<()>;
}
