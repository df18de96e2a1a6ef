/// Core error type for the adapter.
///
/// Backend crates map their transport errors into this type so the adapter
/// can report failures consistently (construction, send, shutdown).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("could not send message, channel '{0}' not found")]
    ChannelNotFound(String),

    /// An application error reported by the chat server.
    #[error("api error {status} ({id}): {message}")]
    Api {
        status: u16,
        id: String,
        message: String,
    },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
