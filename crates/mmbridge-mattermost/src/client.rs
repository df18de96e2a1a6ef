use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn, Instrument, Span};

use mmbridge_core::{
    config::Config,
    domain::{Channel, Post, Team, User, WebSocketEvent},
    ports::ChatBackend,
    Result,
};

use crate::{
    api::ApiClient,
    websocket::{self, Socket, EVENT_BUFFER},
};

const READER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Listener {
    /// Connected socket, until someone starts listening.
    socket: Option<Socket>,
    events: Option<mpsc::Receiver<WebSocketEvent>>,
    reader: Option<JoinHandle<()>>,
}

/// [`ChatBackend`] over the Mattermost REST API and WebSocket feed.
pub struct MattermostClient {
    api: ApiClient,
    listener: Mutex<Listener>,
    shutdown: CancellationToken,
    span: Span,
}

impl MattermostClient {
    /// Connect the WebSocket for `cfg.server_url`, authenticated with `cfg.token`.
    ///
    /// Events are not read until [`ChatBackend::event_stream`] is called.
    pub async fn connect(cfg: &Config) -> Result<Self> {
        let api = ApiClient::new(&cfg.server_url, cfg.token.clone())?;
        let ws_url = websocket::websocket_url(&cfg.server_url)?;
        let socket = websocket::connect(&ws_url, &cfg.token)
            .instrument(cfg.span.clone())
            .await?;
        Ok(Self::from_parts(api, Some(socket), cfg.span.clone()))
    }

    /// REST only: `event_stream` yields `None`.
    #[cfg(test)]
    pub(crate) fn rest_only(server_url: &url::Url, token: &str) -> Result<Self> {
        Ok(Self::from_parts(
            ApiClient::new(server_url, token)?,
            None,
            Span::current(),
        ))
    }

    fn from_parts(api: ApiClient, socket: Option<Socket>, span: Span) -> Self {
        Self {
            api,
            listener: Mutex::new(Listener {
                socket,
                ..Default::default()
            }),
            shutdown: CancellationToken::new(),
            span,
        }
    }
}

#[async_trait]
impl ChatBackend for MattermostClient {
    async fn create_post(&self, post: &Post) -> Result<Post> {
        self.api.create_post(post).await
    }

    async fn get_me(&self, etag: &str) -> Result<User> {
        self.api.get_me(etag).await
    }

    async fn event_stream(&self) -> Option<mpsc::Receiver<WebSocketEvent>> {
        let mut listener = self.listener.lock().await;
        if let Some(socket) = listener.socket.take() {
            let (tx, rx) = mpsc::channel(EVENT_BUFFER);
            let reader = tokio::spawn(
                websocket::read_events(socket, tx, self.shutdown.clone())
                    .instrument(self.span.clone()),
            );
            listener.reader = Some(reader);
            listener.events = Some(rx);
            debug!(parent: &self.span, "listening for websocket events");
        }
        listener.events.take()
    }

    async fn get_channel(&self, channel_id: &str, etag: &str) -> Result<Channel> {
        self.api.get_channel(channel_id, etag).await
    }

    async fn get_channel_by_name(
        &self,
        name: &str,
        team_id: &str,
        etag: &str,
    ) -> Result<Channel> {
        self.api.get_channel_by_name(name, team_id, etag).await
    }

    async fn get_team_by_name(&self, name: &str, etag: &str) -> Result<Team> {
        self.api.get_team_by_name(name, etag).await
    }

    async fn close(&self) -> Result<()> {
        self.shutdown.cancel();

        let (socket, reader) = {
            let mut listener = self.listener.lock().await;
            (listener.socket.take(), listener.reader.take())
        };
        if let Some(mut socket) = socket {
            if let Err(e) = socket.close(None).await {
                debug!(parent: &self.span, error = %e, "websocket close failed");
            }
        }
        if let Some(reader) = reader {
            if tokio::time::timeout(READER_STOP_TIMEOUT, reader).await.is_err() {
                warn!(parent: &self.span, "websocket reader did not stop in time");
            }
        }

        self.api.logout().instrument(self.span.clone()).await
    }
}
