//! Mattermost backend for `mmbridge-core`.
//!
//! [`MattermostClient`] implements the core `ChatBackend` port over the
//! Mattermost REST API v4 and WebSocket feed. [`connect`] builds a ready
//! adapter; [`module`] does the same as a brain module.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info_span;

pub mod api;
pub mod client;
pub mod websocket;

pub use client::MattermostClient;

use mmbridge_core::{
    brain::{BrainConfig, Module},
    config::{Config, ConfigOption},
    BotAdapter, Result,
};

/// Connect to the server described by `cfg` and authenticate the adapter.
///
/// The event loop stops when `cancel` fires or the adapter is closed.
pub async fn connect(cfg: &Config, cancel: CancellationToken) -> Result<BotAdapter> {
    let client = MattermostClient::connect(cfg).await?;
    BotAdapter::new(Arc::new(client), cfg, cancel).await
}

/// A brain module that connects a Mattermost adapter and installs it.
pub fn module(
    token: impl Into<String>,
    server_url: impl Into<String>,
    team: impl Into<String>,
    options: Vec<ConfigOption>,
) -> MattermostModule {
    MattermostModule {
        token: token.into(),
        server_url: server_url.into(),
        team: team.into(),
        options,
    }
}

pub struct MattermostModule {
    token: String,
    server_url: String,
    team: String,
    options: Vec<ConfigOption>,
}

impl MattermostModule {
    /// The adapter config this module would connect with under `brain`.
    pub fn config(&self, brain: &BrainConfig) -> Result<Config> {
        let mut cfg = Config::new(self.token.clone(), &self.server_url, self.team.clone())?;
        cfg.name = brain.name.clone();
        cfg.span = info_span!(parent: &brain.span, "mattermost");
        cfg.with_options(self.options.iter().cloned())
    }
}

#[async_trait]
impl Module for MattermostModule {
    async fn apply(&self, brain: &mut BrainConfig) -> Result<()> {
        let cfg = self.config(brain)?;
        let adapter = connect(&cfg, brain.cancel.clone()).await?;
        brain.set_adapter(Arc::new(adapter));
        Ok(())
    }
}
