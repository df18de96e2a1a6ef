//! Mattermost real-time event feed over WebSocket.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use mmbridge_core::{domain::WebSocketEvent, errors::Error, Result};

pub(crate) type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Events buffered between the socket reader and the adapter.
pub(crate) const EVENT_BUFFER: usize = 100;

/// `https://host/prefix` → `wss://host/prefix/api/v4/websocket`.
pub fn websocket_url(server_url: &Url) -> Result<Url> {
    let scheme = match server_url.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(Error::Config(format!(
                "unsupported server url scheme '{other}'"
            )))
        }
    };

    let mut url = server_url.clone();
    url.set_scheme(scheme)
        .map_err(|_| Error::Config(format!("cannot derive websocket url from {server_url}")))?;
    let path = format!("{}/api/v4/websocket", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Open the socket and authenticate it with `token`.
pub(crate) async fn connect(url: &Url, token: &str) -> Result<Socket> {
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::External(format!("invalid websocket request: {e}")))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| Error::Config("token is not a valid header value".to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, bearer);

    let (mut socket, _) = connect_async(request)
        .await
        .map_err(|e| Error::External(format!("websocket connect failed: {e}")))?;

    let challenge = json!({
        "seq": 1,
        "action": "authentication_challenge",
        "data": { "token": token },
    });
    socket
        .send(Message::text(challenge.to_string()))
        .await
        .map_err(|e| Error::External(format!("websocket authentication failed: {e}")))?;

    debug!(url = %url, "websocket connected");
    Ok(socket)
}

/// Decode one text frame. Replies to our own actions (`seq_reply`) and other
/// frames without an `event` kind yield `None`.
pub(crate) fn decode_frame(text: &str) -> Option<WebSocketEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "dropping malformed websocket frame");
            return None;
        }
    };

    if value.get("event").is_none() {
        trace!(frame = %text, "ignoring non-event frame");
        return None;
    }

    match serde_json::from_value(value) {
        Ok(evt) => Some(evt),
        Err(e) => {
            warn!(error = %e, "dropping undecodable websocket event");
            None
        }
    }
}

/// Forward events from `socket` into `tx` until the socket ends, the
/// receiver goes away, or `cancel` fires. Dropping `tx` on return closes
/// the feed for the adapter.
pub(crate) async fn read_events(
    mut socket: Socket,
    tx: mpsc::Sender<WebSocketEvent>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = socket.close(None).await {
                    debug!(error = %e, "websocket close failed");
                }
                return;
            }
            frame = socket.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                let Some(evt) = decode_frame(text.as_str()) else {
                    continue;
                };
                if tx.send(evt).await.is_err() {
                    debug!("event receiver dropped; stopping websocket reader");
                    return;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "websocket closed by server");
                return;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(error = %e, "websocket read failed");
                return;
            }
            None => return,
        }
    }
}
