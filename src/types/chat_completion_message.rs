use serde::{Deserialize, Serialize};

use crate::types::{Message, MessageRole};

/// Role of a message sent to the completion endpoint.
///
/// Unlike [`MessageRole`], this includes the system role, which never appears
/// in a transcript.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System role.
    System,

    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

impl From<MessageRole> for ChatRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
        }
    }
}

/// A message as it appears in an outbound completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionMessage {
    /// The role of the message.
    pub role: ChatRole,

    /// The text of the message.
    pub content: String,
}

impl ChatCompletionMessage {
    /// Create a new `ChatCompletionMessage`.
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new system `ChatCompletionMessage`.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }
}

impl From<&Message> for ChatCompletionMessage {
    fn from(message: &Message) -> Self {
        Self::new(message.role.into(), message.content.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serialization() {
        assert_eq!(serde_json::to_string(&ChatRole::System).unwrap(), r#""system""#);
        assert_eq!(serde_json::to_string(&ChatRole::User).unwrap(), r#""user""#);
        assert_eq!(
            serde_json::to_string(&ChatRole::Assistant).unwrap(),
            r#""assistant""#
        );
    }

    #[test]
    fn from_transcript_message() {
        let outbound = ChatCompletionMessage::from(&Message::assistant("Try a loop."));
        assert_eq!(outbound.role, ChatRole::Assistant);
        assert_eq!(outbound.content, "Try a loop.");
    }
}
