use serde::{Deserialize, Serialize};

/// Role of a message in the conversation transcript.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User role.
    User,

    /// Assistant role.
    Assistant,
}

/// A single entry of the conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message.
    pub role: MessageRole,

    /// The text of the message.
    pub content: String,
}

impl Message {
    /// Create a new `Message` with the given role and content.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user `Message`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a new assistant `Message`.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_serialization() {
        let message = Message::user("What is a closure?");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            json!({
                "role": "user",
                "content": "What is a closure?"
            })
        );
    }

    #[test]
    fn message_deserialization() {
        let json = json!({
            "role": "assistant",
            "content": ""
        });
        let message: Message = serde_json::from_value(json).unwrap();
        assert_eq!(message, Message::assistant(""));
    }
}
