//! Outbound message model
//!
//! What a handler asks the queue to publish, and how it is rendered into the
//! body of a `message/create` or `message/update` call.

use crate::api::{SendAction, SendRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Message type code on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    Text = 1,
    KMarkdown = 9,
    Card = 10,
}

impl MessageKind {
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::KMarkdown => "kmarkdown",
            Self::Card => "card",
        };
        f.write_str(name)
    }
}

/// One card of a card message
///
/// Modules are kept as raw JSON; only their `content` strings matter to the
/// queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "type", default = "card_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub modules: Vec<Value>,
}

fn card_type() -> String {
    "card".to_string()
}

impl Default for Card {
    fn default() -> Self {
        Self {
            kind: card_type(),
            theme: None,
            size: None,
            color: None,
            modules: Vec::new(),
        }
    }
}

impl Card {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    #[must_use]
    pub fn with_module(mut self, module: Value) -> Self {
        self.modules.push(module);
        self
    }

    /// Append a KMarkdown text section
    #[must_use]
    pub fn section(self, content: impl Into<String>) -> Self {
        self.with_module(section_module(content))
    }

    #[must_use]
    pub fn divider(self) -> Self {
        self.with_module(divider_module())
    }
}

/// KMarkdown section module
pub fn section_module(content: impl Into<String>) -> Value {
    json!({
        "type": "section",
        "text": {"type": "kmarkdown", "content": content.into()},
    })
}

/// Context module with a single KMarkdown element
pub fn context_module(content: impl Into<String>) -> Value {
    json!({
        "type": "context",
        "elements": [{"type": "kmarkdown", "content": content.into()}],
    })
}

pub fn divider_module() -> Value {
    json!({"type": "divider"})
}

/// Rendered content of an outbound message
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    KMarkdown(String),
    Card(Vec<Card>),
}

impl MessageContent {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text(_) => MessageKind::Text,
            Self::KMarkdown(_) => MessageKind::KMarkdown,
            Self::Card(_) => MessageKind::Card,
        }
    }

    /// The `content` field as sent; cards travel as a JSON string
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::Text(text) | Self::KMarkdown(text) => Ok(text.clone()),
            Self::Card(cards) => serde_json::to_string(cards),
        }
    }
}

/// A message waiting to be published
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Channel to publish into
    pub target_id: String,
    pub content: MessageContent,
    /// Message to reply to
    pub quote: Option<String>,
    /// Only this user sees the message
    pub temp_target_id: Option<String>,
    /// Source-side message id; repeated ids become updates
    pub correlation_id: Option<String>,
    /// Target-side message to update instead of creating a new one
    pub target_message_id: Option<String>,
    /// Idempotency token
    pub nonce: String,
}

impl OutboundMessage {
    pub fn new(target_id: impl Into<String>, content: MessageContent) -> Self {
        Self {
            target_id: target_id.into(),
            content,
            quote: None,
            temp_target_id: None,
            correlation_id: None,
            target_message_id: None,
            nonce: generate_nonce(),
        }
    }

    pub fn text(target_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(target_id, MessageContent::Text(text.into()))
    }

    pub fn kmarkdown(target_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(target_id, MessageContent::KMarkdown(text.into()))
    }

    pub fn card(target_id: impl Into<String>, cards: Vec<Card>) -> Self {
        Self::new(target_id, MessageContent::Card(cards))
    }

    pub fn with_quote(mut self, msg_id: impl Into<String>) -> Self {
        self.quote = Some(msg_id.into());
        self
    }

    pub fn with_temp_target(mut self, user_id: impl Into<String>) -> Self {
        self.temp_target_id = Some(user_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_target_message_id(mut self, msg_id: impl Into<String>) -> Self {
        self.target_message_id = Some(msg_id.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = nonce.into();
        self
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.content.kind()
    }

    #[must_use]
    pub fn is_card(&self) -> bool {
        matches!(self.content, MessageContent::Card(_))
    }

    /// Build the API call: an update when a target message is known, a create otherwise
    pub fn to_request(&self) -> Result<SendRequest, serde_json::Error> {
        let mut body = Map::new();

        let action = match &self.target_message_id {
            Some(msg_id) => {
                body.insert("msg_id".into(), Value::from(msg_id.as_str()));
                SendAction::Update
            }
            None => {
                body.insert("type".into(), Value::from(self.kind().as_u8()));
                body.insert("target_id".into(), Value::from(self.target_id.as_str()));
                body.insert("nonce".into(), Value::from(self.nonce.as_str()));
                SendAction::Create
            }
        };

        body.insert("content".into(), Value::from(self.content.to_wire()?));
        if let Some(quote) = &self.quote {
            body.insert("quote".into(), Value::from(quote.as_str()));
        }
        if let Some(user) = &self.temp_target_id {
            body.insert("temp_target_id".into(), Value::from(user.as_str()));
        }

        Ok(SendRequest {
            action,
            body: Value::Object(body),
        })
    }
}

/// Fresh idempotency token
pub fn generate_nonce() -> String {
    format!("bridge-{}", uuid::Uuid::new_v4())
}
