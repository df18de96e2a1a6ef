use std::{env, fmt, path::Path, sync::Arc};

use tracing::{debug, warn, Span};
use url::Url;

use crate::{errors::Error, Result};

const DEFAULT_BOT_NAME: &str = "mmbridge";

/// Configuration of a Mattermost adapter.
#[derive(Clone)]
pub struct Config {
    /// Personal access token or bot token of the account the adapter runs as.
    pub token: String,
    pub server_url: Url,
    /// Team whose channels `send` resolves names in.
    pub team: String,
    /// Display name of the bot, as the brain knows it.
    pub name: String,
    /// Parent span for everything the adapter logs.
    pub span: Span,
}

/// An option applied to a [`Config`] after its required fields are set.
pub type ConfigOption = Arc<dyn Fn(&mut Config) -> Result<()> + Send + Sync>;

impl Config {
    pub fn new(token: impl Into<String>, server_url: &str, team: impl Into<String>) -> Result<Self> {
        Ok(Self {
            token: token.into(),
            server_url: Url::parse(server_url)?,
            team: team.into(),
            name: DEFAULT_BOT_NAME.to_string(),
            span: Span::none(),
        })
    }

    /// Apply `opts` in order; the first failing option aborts.
    pub fn with_options(mut self, opts: impl IntoIterator<Item = ConfigOption>) -> Result<Self> {
        for opt in opts {
            opt(&mut self)?;
        }
        Ok(self)
    }

    /// Load from `MATTERMOST_*` environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            var(key)
                .and_then(non_empty)
                .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
        };

        let token = required("MATTERMOST_TOKEN")?;
        let server_url = required("MATTERMOST_URL")?;
        let team = required("MATTERMOST_TEAM")?;

        let mut cfg = Self::new(token.trim(), server_url.trim(), team.trim())?;
        if let Some(name) = var("BOT_NAME").and_then(non_empty) {
            cfg.name = name.trim().to_string();
        }
        Ok(cfg)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"<redacted>")
            .field("server_url", &self.server_url.as_str())
            .field("team", &self.team)
            .field("name", &self.name)
            .finish()
    }
}

/// Log under `span` instead of the default `mattermost` span.
pub fn with_span(span: Span) -> ConfigOption {
    Arc::new(move |cfg| {
        cfg.span = span.clone();
        Ok(())
    })
}

pub fn with_name(name: impl Into<String>) -> ConfigOption {
    let name = name.into();
    Arc::new(move |cfg| {
        if name.trim().is_empty() {
            return Err(Error::Config("bot name must not be empty".to_string()));
        }
        cfg.name = name.clone();
        Ok(())
    })
}

fn load_dotenv_if_present(path: &Path) {
    match dotenvy::from_path(path) {
        Ok(()) => debug!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable environment file"),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
