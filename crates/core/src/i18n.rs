//! Message lookup for user-facing labels.

use std::collections::HashMap;

pub trait Translator: Send + Sync {
    /// Localized text for `key`. Unknown keys come back unchanged.
    fn trans(&self, key: &str) -> String;
}

/// Flat key → message catalog for a single locale.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    locale: String,
    messages: HashMap<String, String>,
}

impl MessageCatalog {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            messages: HashMap::new(),
        }
    }

    pub fn with_message(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.messages.insert(key.into(), message.into());
        self
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }
}

impl Translator for MessageCatalog {
    fn trans(&self, key: &str) -> String {
        self.messages
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}
