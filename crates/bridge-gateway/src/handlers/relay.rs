//! Relay handler
//!
//! Logs application frames and, when a relay channel is configured, mirrors
//! chat messages into it. Edits of a mirrored message update the mirror.

use super::MessageHandler;
use crate::events::{ApplicationFrame, MessageEvent};
use async_trait::async_trait;
use bridge_delivery::{DeliveryQueue, OutboundMessage};
use std::collections::HashMap;
use std::sync::Mutex;

const UPDATED_MESSAGE: &str = "updated_message";

pub struct RelayHandler {
    queue: DeliveryQueue,
    channel_id: Option<String>,
    /// Source msg_id -> header line of its mirror
    mirrored: Mutex<HashMap<String, String>>,
}

impl RelayHandler {
    pub fn new(queue: DeliveryQueue, channel_id: Option<String>) -> Self {
        Self {
            queue,
            channel_id,
            mirrored: Mutex::new(HashMap::new()),
        }
    }

    fn mirror_message(&self, channel: &str, event: &MessageEvent) {
        // Never echo the relay channel into itself
        if event.target_id == channel || event.msg_id.is_empty() {
            return;
        }

        let header = header_line(event);
        let message = OutboundMessage::kmarkdown(channel, format!("{header}\n{}", event.content))
            .with_correlation_id(event.msg_id.as_str());

        if let Ok(mut mirrored) = self.mirrored.lock() {
            mirrored.insert(event.msg_id.clone(), header);
        }
        self.queue.enqueue(message);
    }

    fn mirror_update(&self, channel: &str, event: &MessageEvent) {
        let (Some(msg_id), Some(content)) =
            (event.event_body_str("msg_id"), event.event_body_str("content"))
        else {
            tracing::debug!(body = %event.extra.body, "Update event without message body");
            return;
        };

        let header = match self.mirrored.lock() {
            Ok(mirrored) => mirrored.get(msg_id).cloned(),
            Err(_) => None,
        };
        let Some(header) = header else {
            tracing::debug!(msg_id, "Update of a message that was never mirrored");
            return;
        };

        let message = OutboundMessage::kmarkdown(channel, format!("{header}\n{content}"))
            .with_correlation_id(msg_id);
        self.queue.enqueue(message);
    }
}

#[async_trait]
impl MessageHandler for RelayHandler {
    async fn handle(&self, frame: ApplicationFrame) {
        let Some(event) = frame.message() else {
            tracing::debug!(sequence = frame.sequence, "Ignoring non-message frame");
            return;
        };

        if event.is_from_automation() {
            tracing::trace!(msg_id = %event.msg_id, "Ignoring automated message");
            return;
        }

        match event.system_event_type() {
            Some(UPDATED_MESSAGE) => {
                tracing::debug!(sequence = frame.sequence, body = %event.extra.body, "Message updated");
                if let Some(channel) = &self.channel_id {
                    self.mirror_update(channel, &event);
                }
            }
            Some(event_type) => {
                tracing::debug!(sequence = frame.sequence, event_type, "System event");
            }
            None => {
                tracing::info!(
                    sequence = frame.sequence,
                    channel_id = %event.target_id,
                    author_id = %event.author_id,
                    msg_id = %event.msg_id,
                    "Chat message"
                );
                if let Some(channel) = &self.channel_id {
                    self.mirror_message(channel, &event);
                }
            }
        }
    }
}

fn header_line(event: &MessageEvent) -> String {
    let author = event
        .extra
        .author
        .as_ref()
        .map(|a| a.nickname.clone().filter(|n| !n.is_empty()).unwrap_or_else(|| a.username.clone()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| event.author_id.clone());

    match &event.extra.channel_name {
        Some(channel) => format!("**{author}** in #{channel}"),
        None => format!("**{author}**"),
    }
}
