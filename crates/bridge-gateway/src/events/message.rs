//! Typed message events

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type codes of an application frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Text,
    Image,
    Video,
    File,
    KMarkdown,
    Card,
    System,
    Other(u8),
}

impl MessageType {
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Text,
            2 => Self::Image,
            3 => Self::Video,
            4 => Self::File,
            9 => Self::KMarkdown,
            10 => Self::Card,
            255 => Self::System,
            other => Self::Other(other),
        }
    }
}

/// Author block of a chat message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub is_sys: bool,
}

/// `extra` block of a message
///
/// For chat messages `type` repeats the message type code; for system
/// messages it names the event (`updated_message`, `guild_member_online`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageExtra {
    #[serde(rename = "type", default)]
    pub kind: Value,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
    #[serde(default)]
    pub author: Option<MessageAuthor>,
    /// Event body of system messages
    #[serde(default)]
    pub body: Value,
}

/// Chat or system message carried by an application frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// `GROUP`, `PERSON` or `BROADCAST`
    #[serde(default)]
    pub channel_type: String,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub author_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub msg_id: String,
    #[serde(default)]
    pub msg_timestamp: i64,
    #[serde(default)]
    pub extra: MessageExtra,
}

impl MessageEvent {
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        MessageType::from_u8(self.kind)
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.message_type() == MessageType::System
    }

    /// Event name of a system message
    #[must_use]
    pub fn system_event_type(&self) -> Option<&str> {
        if self.is_system() {
            self.extra.kind.as_str()
        } else {
            None
        }
    }

    /// Chat message written by a bot or by the platform itself.
    ///
    /// Handlers skip these so the bridge never reacts to its own output.
    #[must_use]
    pub fn is_from_automation(&self) -> bool {
        if self.is_system() {
            return false;
        }
        self.extra
            .author
            .as_ref()
            .is_some_and(|author| author.bot || author.is_sys)
    }

    /// Field of the system event body as a string
    #[must_use]
    pub fn event_body_str(&self, key: &str) -> Option<&str> {
        self.extra.body.get(key).and_then(Value::as_str)
    }
}
