use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// WebSocket event kind for a newly created post.
pub const EVENT_POSTED: &str = "posted";

/// Mattermost channel type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// Public channel in a team.
    #[default]
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
    /// One-to-one direct message channel.
    #[serde(rename = "D")]
    Direct,
    /// Group direct message (three or more members).
    #[serde(rename = "G")]
    Group,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub team_id: String,
    #[serde(rename = "type", default)]
    pub channel_type: ChannelType,
}

impl Channel {
    pub fn is_direct(&self) -> bool {
        self.channel_type == ChannelType::Direct
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

/// A Mattermost user; for the adapter this is always the bot account itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
}

impl User {
    /// The `@username` string that addresses this user in a shared channel.
    pub fn mention(&self) -> String {
        format!("@{}", self.username)
    }
}

/// A chat post.
///
/// Fields the adapter does not interpret are kept in `extra` so the post can
/// be handed to the brain as the original payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub id: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub channel_id: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub root_id: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Map::is_empty"
    )]
    pub props: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    /// An outbound post carrying only a destination and text.
    pub fn outbound(channel_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message: message.into(),
            ..Default::default()
        }
    }
}

/// A raw event from the server's WebSocket feed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSocketEvent {
    pub event: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub broadcast: Option<Value>,
    #[serde(default)]
    pub seq: i64,
}

impl WebSocketEvent {
    /// A `posted` event carrying `post` serialized the way the server does
    /// it: as a JSON string under `data.post`.
    pub fn posted(post: &Post) -> serde_json::Result<Self> {
        let mut data = Map::new();
        data.insert("post".to_string(), Value::String(serde_json::to_string(post)?));
        Ok(Self {
            event: EVENT_POSTED.to_string(),
            data,
            broadcast: None,
            seq: 0,
        })
    }
}

/// `null` decodes like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Canonical, backend-agnostic inbound message handed to the brain.
#[derive(Clone, Debug, PartialEq)]
pub struct ReceiveMessageEvent {
    /// Message text with a leading bot mention stripped.
    pub text: String,
    /// Channel name; valid as a destination for `send`.
    pub channel: String,
    pub author_id: String,
    pub id: String,
    /// The decoded post this event was built from.
    pub data: Post,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_type_uses_single_letter_codes() {
        let ch: Channel =
            serde_json::from_str(r#"{"id":"dm0","name":"a__b","type":"D","header":"x"}"#).unwrap();
        assert!(ch.is_direct());

        let ch: Channel = serde_json::from_str(r#"{"id":"c","type":"X"}"#).unwrap();
        assert_eq!(ch.channel_type, ChannelType::Unknown);
    }

    #[test]
    fn post_keeps_unknown_fields() {
        let raw = r#"{"id":"p1","channel_id":"c1","user_id":"u1","message":"hi","create_at":17,"props":{"from_bot":"true"}}"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.extra.get("create_at"), Some(&Value::from(17)));
        assert_eq!(post.props.get("from_bot"), Some(&Value::from("true")));
    }

    #[test]
    fn null_post_fields_decode_as_empty() {
        let raw = r#"{"id":"p1","channel_id":"c1","user_id":null,"message":"hi","root_id":null,"props":null}"#;
        let post: Post = serde_json::from_str(raw).unwrap();
        assert_eq!(post.message, "hi");
        assert!(post.user_id.is_empty());
        assert!(post.root_id.is_empty());
        assert!(post.props.is_empty());
        assert!(post.extra.is_empty());
    }

    #[test]
    fn outbound_post_serializes_only_destination_and_text() {
        let v = serde_json::to_value(Post::outbound("c1", "Hello World")).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"channel_id": "c1", "message": "Hello World"})
        );
    }
}
