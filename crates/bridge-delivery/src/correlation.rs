//! Source message id to target message id

use std::collections::HashMap;

/// Correlation of source messages to the target messages they produced.
///
/// Entries live for the whole process; there is no eviction.
#[derive(Debug, Clone, Default)]
pub struct CorrelationMap {
    entries: HashMap<String, String>,
}

impl CorrelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target message produced for `correlation_id`
    pub fn get(&self, correlation_id: &str) -> Option<&str> {
        self.entries.get(correlation_id).map(String::as_str)
    }

    /// Record a mapping, returning the previous target if any
    pub fn insert(
        &mut self,
        correlation_id: impl Into<String>,
        target_message_id: impl Into<String>,
    ) -> Option<String> {
        self.entries
            .insert(correlation_id.into(), target_message_id.into())
    }

    pub fn contains(&self, correlation_id: &str) -> bool {
        self.entries.contains_key(correlation_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
