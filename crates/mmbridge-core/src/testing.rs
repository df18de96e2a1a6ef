//! In-memory test doubles for the backend port and the brain sink.

use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    brain::EventSink,
    domain::{Channel, ChannelType, Post, ReceiveMessageEvent, Team, User, WebSocketEvent},
    errors::Error,
    ports::ChatBackend,
    Result,
};

pub(crate) fn bot_user() -> User {
    User {
        id: "testID".to_string(),
        username: "testname".to_string(),
    }
}

pub(crate) fn dummy_user() -> User {
    User {
        id: "123".to_string(),
        username: "dummy_user".to_string(),
    }
}

pub(crate) fn dummy_room() -> Channel {
    Channel {
        id: "room0".to_string(),
        name: "Room 0".to_string(),
        channel_type: ChannelType::Private,
        ..Default::default()
    }
}

pub(crate) fn dummy_dm() -> Channel {
    Channel {
        id: "dm0".to_string(),
        name: "DM".to_string(),
        channel_type: ChannelType::Direct,
        ..Default::default()
    }
}

pub(crate) fn dummy_team() -> Team {
    Team {
        id: "789".to_string(),
        name: "Awesome Team".to_string(),
        ..Default::default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    GetMe,
    GetChannel(String),
    GetChannelByName(String, String),
    GetTeamByName(String),
    CreatePost,
    EventStream,
    Close,
}

pub(crate) struct FakeBackend {
    pub me: Option<User>,
    pub teams: Vec<Team>,
    pub channels: Vec<Channel>,
    pub fail_create: bool,
    pub close_error: Option<String>,
    /// Delay inside channel lookups, to widen race windows.
    pub lookup_delay: Duration,
    pub calls: Mutex<Vec<Call>>,
    pub posts: Mutex<Vec<Post>>,
    tx: Mutex<Option<mpsc::Sender<WebSocketEvent>>>,
    rx: Mutex<Option<mpsc::Receiver<WebSocketEvent>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(16);
        Self {
            me: Some(bot_user()),
            teams: vec![dummy_team()],
            channels: vec![dummy_room(), dummy_dm()],
            fail_create: false,
            close_error: None,
            lookup_delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(Some(rx)),
        }
    }

    pub async fn push(&self, event: WebSocketEvent) {
        let tx = self.tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            tx.send(event).await.unwrap();
        }
    }

    pub async fn push_post(&self, post: &Post) {
        self.push(WebSocketEvent::posted(post).unwrap()).await;
    }

    /// End the event feed without going through `close`.
    pub fn hang_up(&self) {
        self.tx.lock().unwrap().take();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn not_found(what: &str) -> Error {
        Error::Api {
            status: 404,
            id: "store.sql.not_found".to_string(),
            message: format!("{what} not found"),
        }
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn create_post(&self, post: &Post) -> Result<Post> {
        self.record(Call::CreatePost);
        if self.fail_create {
            return Err(Error::Api {
                status: 403,
                id: "api.context.permissions.app_error".to_string(),
                message: "no permission".to_string(),
            });
        }
        self.posts.lock().unwrap().push(post.clone());
        Ok(post.clone())
    }

    async fn get_me(&self, _etag: &str) -> Result<User> {
        self.record(Call::GetMe);
        self.me.clone().ok_or_else(|| Error::Api {
            status: 401,
            id: "api.context.session_expired.app_error".to_string(),
            message: "Invalid or expired session".to_string(),
        })
    }

    async fn event_stream(&self) -> Option<mpsc::Receiver<WebSocketEvent>> {
        self.record(Call::EventStream);
        self.rx.lock().unwrap().take()
    }

    async fn get_channel(&self, channel_id: &str, _etag: &str) -> Result<Channel> {
        self.record(Call::GetChannel(channel_id.to_string()));
        tokio::time::sleep(self.lookup_delay).await;
        self.channels
            .iter()
            .find(|c| c.id == channel_id)
            .cloned()
            .ok_or_else(|| Self::not_found("channel"))
    }

    async fn get_channel_by_name(
        &self,
        name: &str,
        team_id: &str,
        _etag: &str,
    ) -> Result<Channel> {
        self.record(Call::GetChannelByName(name.to_string(), team_id.to_string()));
        tokio::time::sleep(self.lookup_delay).await;
        self.channels
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| Self::not_found("channel"))
    }

    async fn get_team_by_name(&self, name: &str, _etag: &str) -> Result<Team> {
        self.record(Call::GetTeamByName(name.to_string()));
        self.teams
            .iter()
            .find(|t| t.name == name)
            .cloned()
            .ok_or_else(|| Self::not_found("team"))
    }

    async fn close(&self) -> Result<()> {
        self.record(Call::Close);
        self.hang_up();
        match &self.close_error {
            Some(msg) => Err(Error::External(msg.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    pub events: Mutex<Vec<ReceiveMessageEvent>>,
}

impl RecordingSink {
    pub fn recorded(&self) -> Vec<ReceiveMessageEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ReceiveMessageEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub(crate) fn post(id: &str, channel_id: &str, user_id: &str, message: &str) -> Post {
    Post {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
        user_id: user_id.to_string(),
        message: message.to_string(),
        ..Default::default()
    }
}
