use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mmbridge_core::{
    brain::{BrainConfig, ChatAdapter, EventSink, Module, QueueSink},
    config::Config,
};

/// Echo bot: answers every message addressed to it with the same text.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mmbridge_core::logging::init("mmbridge")?;

    let cfg = Config::from_env()?;
    let cancel = CancellationToken::new();

    let mut brain = BrainConfig::new(cfg.name.clone(), cancel.clone());
    mmbridge_mattermost::module(
        cfg.token.clone(),
        cfg.server_url.as_str(),
        cfg.team.clone(),
        vec![],
    )
    .apply(&mut brain)
    .await
    .context("failed to connect to mattermost")?;

    let adapter = brain
        .adapter()
        .context("mattermost module did not install an adapter")?;

    let (sink, mut inbox) = QueueSink::new();
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    adapter.register_at(sink);
    info!(bot = %cfg.name, "bot started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            msg = inbox.recv() => {
                let Some(msg) = msg else { break };
                reply(adapter.as_ref(), &msg.channel, &msg.text).await;
            }
        }
    }

    cancel.cancel();
    if let Err(e) = adapter.close().await {
        error!(error = %e, "failed to close mattermost adapter");
    }
    Ok(())
}

async fn reply(adapter: &dyn ChatAdapter, channel: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Err(e) = adapter.send(text, channel).await {
        error!(channel = %channel, error = %e, "reply failed");
    }
}
