//! Channel lookup cache.
//!
//! Channels are fetched from the server on first reference and kept for the
//! lifetime of the adapter. Entries are keyed by channel name; lookups by ID
//! go through a reverse ID→name map so both paths land on the same entry.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use crate::{domain::Channel, ports::ChatBackend};

#[derive(Debug, Default)]
struct Rooms {
    by_name: HashMap<String, Channel>,
    names_by_id: HashMap<String, String>,
}

impl Rooms {
    fn by_id(&self, id: &str) -> Option<&Channel> {
        self.names_by_id
            .get(id)
            .and_then(|name| self.by_name.get(name))
    }
}

pub struct ChannelCache {
    backend: Arc<dyn ChatBackend>,
    team_id: String,
    rooms: RwLock<Rooms>,
}

impl ChannelCache {
    /// A cache resolving names within the team `team_id`.
    pub fn new(backend: Arc<dyn ChatBackend>, team_id: impl Into<String>) -> Self {
        Self {
            backend,
            team_id: team_id.into(),
            rooms: RwLock::new(Rooms::default()),
        }
    }

    /// Resolve a channel of the team by name. `None` if the server does not
    /// know it (or the lookup failed).
    pub async fn resolve_by_name(&self, name: &str) -> Option<Channel> {
        {
            let rooms = self.rooms.read().await;
            if let Some(ch) = rooms.by_name.get(name) {
                return Some(ch.clone());
            }
        }

        let mut rooms = self.rooms.write().await;
        // Another task may have filled it in while we waited for the write lock.
        if let Some(ch) = rooms.by_name.get(name) {
            return Some(ch.clone());
        }

        match self
            .backend
            .get_channel_by_name(name, &self.team_id, "")
            .await
        {
            Ok(ch) => {
                debug!(channel = %name, channel_id = %ch.id, "cached channel");
                rooms.by_name.insert(name.to_string(), ch.clone());
                Some(ch)
            }
            Err(e) => {
                error!(channel = %name, error = %e, "received error from get_channel_by_name");
                None
            }
        }
    }

    /// Resolve a channel by ID.
    pub async fn resolve_by_id(&self, id: &str) -> Option<Channel> {
        {
            let rooms = self.rooms.read().await;
            if let Some(ch) = rooms.by_id(id) {
                return Some(ch.clone());
            }
        }

        let mut rooms = self.rooms.write().await;
        if let Some(ch) = rooms.by_id(id) {
            return Some(ch.clone());
        }

        let ch = match self.backend.get_channel(id, "").await {
            Ok(ch) => ch,
            Err(e) => {
                error!(channel_id = %id, error = %e, "received error from get_channel");
                return None;
            }
        };

        // The name entry is authoritative. A different channel already owning
        // this name (same name in another team) is returned but not cached.
        if let Some(existing) = rooms.by_name.get(&ch.name) {
            if existing.id != ch.id {
                warn!(
                    channel = %ch.name,
                    channel_id = %ch.id,
                    cached_id = %existing.id,
                    "channel name already maps to another channel; not caching"
                );
                return Some(ch);
            }
        }

        debug!(channel = %ch.name, channel_id = %ch.id, "cached channel");
        rooms.names_by_id.insert(id.to_string(), ch.name.clone());
        rooms.by_name.insert(ch.name.clone(), ch.clone());
        Some(ch)
    }
}
