use crate::error::CompletionError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat-completion service. The response is returned as produced.
pub trait ChatModel {
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, CompletionError>;
}

impl<T: ChatModel + ?Sized> ChatModel for Box<T> {
    fn complete(&self, model: &str, messages: &[ChatMessage]) -> Result<String, CompletionError> {
        (**self).complete(model, messages)
    }
}
