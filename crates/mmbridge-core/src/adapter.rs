use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::{
    brain::{ChatAdapter, EventSink},
    config::Config,
    consumer::EventConsumer,
    domain::{Team, User},
    errors::Error,
    ports::ChatBackend,
    rooms::ChannelCache,
    sender::Sender,
    Result,
};

/// How long `close` waits for the event loop to wind down.
const CONSUMER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Adapter between a Mattermost server and the bot brain.
///
/// Built by [`BotAdapter::new`], which authenticates and looks up the team.
/// [`BotAdapter::register_at`] starts delivering inbound messages;
/// [`BotAdapter::close`] disconnects.
pub struct BotAdapter {
    backend: Arc<dyn ChatBackend>,
    me: User,
    team: Team,
    rooms: Arc<ChannelCache>,
    sender: Sender,
    cancel: CancellationToken,
    span: Span,
    consumer: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl BotAdapter {
    /// Authenticate against the server and resolve the configured team.
    ///
    /// `cancel` is the lifetime of the host; the event loop stops when it fires.
    pub async fn new(
        backend: Arc<dyn ChatBackend>,
        config: &Config,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let span = config.span.clone();
        async move {
            let me = backend
                .get_me("")
                .await
                .map_err(|e| Error::External(format!("error getting self: {e}")))?;

            let team = match backend.get_team_by_name(&config.team, "").await {
                Ok(team) => team,
                Err(e) => {
                    error!(
                        team = %config.team,
                        error = %e,
                        "unable to find team, are you sure the bot is a member?"
                    );
                    return Err(Error::External(format!(
                        "unable to find team '{}': {e}",
                        config.team
                    )));
                }
            };

            info!(
                url = %config.server_url,
                username = %me.username,
                id = %me.id,
                team = %team.name,
                "connected to mattermost api"
            );

            let rooms = Arc::new(ChannelCache::new(backend.clone(), team.id.clone()));
            Ok(Self {
                sender: Sender::new(backend.clone(), rooms.clone()),
                backend,
                me,
                team,
                rooms,
                cancel,
                span: Span::current(),
                consumer: std::sync::Mutex::new(None),
            })
        }
        .instrument(span)
        .await
    }

    /// The account the adapter is logged in as.
    pub fn me(&self) -> &User {
        &self.me
    }

    pub fn team(&self) -> &Team {
        &self.team
    }

    /// Spawn the event loop, emitting inbound messages to `sink`.
    pub fn register_at(&self, sink: Arc<dyn EventSink>) {
        let consumer = EventConsumer::new(self.me.clone(), self.rooms.clone(), sink);
        let backend = self.backend.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(
            async move {
                let events = backend.event_stream().await;
                consumer.run(events, cancel).await;
                debug!("event loop finished");
            }
            .instrument(self.span.clone()),
        );

        let previous = self.lock_consumer().replace(handle);
        if previous.is_some() {
            warn!(parent: &self.span, "adapter registered twice; previous event loop keeps running");
        }
    }

    pub async fn send(&self, text: &str, channel: &str) -> Result<()> {
        self.sender
            .send(text, channel)
            .instrument(self.span.clone())
            .await
    }

    /// Close the server connection and wait (bounded) for the event loop to stop.
    ///
    /// Errors from the backend close are returned. Not meant to be called twice.
    pub async fn close(&self) -> Result<()> {
        let res = self.backend.close().instrument(self.span.clone()).await;

        let handle = self.lock_consumer().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(CONSUMER_STOP_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(parent: &self.span, error = %e, "event loop task failed"),
                Err(_) => warn!(parent: &self.span, "event loop did not stop in time"),
            }
        }

        res
    }

    fn lock_consumer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        // The guarded value stays consistent even if a holder panicked.
        self.consumer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChatAdapter for BotAdapter {
    fn register_at(&self, sink: Arc<dyn EventSink>) {
        BotAdapter::register_at(self, sink)
    }

    async fn send(&self, text: &str, channel: &str) -> Result<()> {
        BotAdapter::send(self, text, channel).await
    }

    async fn close(&self) -> Result<()> {
        BotAdapter::close(self).await
    }
}
