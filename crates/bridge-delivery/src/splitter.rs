//! Content splitter
//!
//! Shrinks a card payload to a character budget. Rendered text is the sum of
//! every `content` string inside the modules, the truncation notice included.
//! Modules are walked in order; the one that crosses the budget is cut,
//! everything after it is dropped, and a notice plus a divider is put in front
//! of the first card.

use crate::message::{context_module, divider_module, Card};
use serde_json::Value;

const DEFAULT_NOTICE: &str = "(content truncated)";

/// Deterministic truncation of card payloads
#[derive(Debug, Clone)]
pub struct ContentSplitter {
    notice: String,
}

impl Default for ContentSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_NOTICE)
    }
}

impl ContentSplitter {
    /// Create a splitter whose notice reads `notice`
    pub fn new(notice: impl Into<String>) -> Self {
        Self {
            notice: notice.into(),
        }
    }

    /// Rendered text length of `cards` as sent, notice included
    pub fn measure(&self, cards: &[Card]) -> usize {
        cards
            .iter()
            .flat_map(|card| &card.modules)
            .map(content_chars)
            .sum()
    }

    /// Characters the notice adds to a split payload
    pub fn notice_chars(&self) -> usize {
        self.notice.chars().count()
    }

    /// Cut `cards` down to `budget` characters of rendered text, notice included.
    ///
    /// A notice from a previous pass is replaced rather than stacked. Returns
    /// `None` when the notice alone leaves no room for content.
    pub fn split(&self, cards: &[Card], budget: usize) -> Option<Vec<Card>> {
        let mut remaining = budget
            .checked_sub(self.notice_chars())
            .filter(|room| *room > 0)?;
        let mut exhausted = false;
        let mut result = Vec::with_capacity(cards.len());

        for card in self.strip_notice(cards) {
            if exhausted {
                break;
            }

            let mut kept = Card {
                modules: Vec::with_capacity(card.modules.len()),
                ..card.clone()
            };

            for module in &card.modules {
                let length = content_chars(module);
                if length <= remaining {
                    remaining -= length;
                    kept.modules.push(module.clone());
                    if remaining == 0 && length > 0 {
                        exhausted = true;
                        break;
                    }
                } else {
                    let mut cut = module.clone();
                    truncate_content(&mut cut, &mut remaining);
                    kept.modules.push(cut);
                    exhausted = true;
                    break;
                }
            }

            if !kept.modules.is_empty() || result.is_empty() {
                result.push(kept);
            }
        }

        if let Some(first) = result.first_mut() {
            first.modules.insert(0, divider_module());
            first.modules.insert(0, self.notice_module());
        }
        Some(result)
    }

    fn notice_module(&self) -> Value {
        context_module(self.notice.as_str())
    }

    /// Copy of `cards` without the notice and divider added by `split`
    fn strip_notice(&self, cards: &[Card]) -> Vec<Card> {
        let mut cards = cards.to_vec();
        if let Some(first) = cards.first_mut() {
            let notice = self.notice_module();
            if first.modules.first() == Some(&notice)
                && first.modules.get(1) == Some(&divider_module())
            {
                first.modules.drain(..2);
            }
        }
        cards
    }
}

/// Characters of every `content` string inside `value`
fn content_chars(value: &Value) -> usize {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(text) if key == "content" => text.chars().count(),
                other => content_chars(other),
            })
            .sum(),
        Value::Array(items) => items.iter().map(content_chars).sum(),
        _ => 0,
    }
}

/// Cut `content` strings in document order so that at most `remaining`
/// characters survive
fn truncate_content(value: &mut Value, remaining: &mut usize) {
    match value {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                match value {
                    Value::String(text) if key == "content" => {
                        let length = text.chars().count();
                        if length > *remaining {
                            *text = text.chars().take(*remaining).collect();
                            *remaining = 0;
                        } else {
                            *remaining -= length;
                        }
                    }
                    other => truncate_content(other, remaining),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                truncate_content(item, remaining);
            }
        }
        _ => {}
    }
}
