use serde::{Deserialize, Serialize};

use crate::types::ChatCompletionMessage;

/// Body of a streaming chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Target model identifier.
    pub model: String,

    /// System prompt followed by the transcript.
    pub messages: Vec<ChatCompletionMessage>,

    /// Always true; the client only speaks the streaming protocol.
    pub stream: bool,

    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Create a new streaming request.
    pub fn new(
        model: impl Into<String>,
        messages: Vec<ChatCompletionMessage>,
        max_tokens: u32,
    ) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatCompletionMessage, Message};
    use serde_json::json;

    #[test]
    fn request_serialization() {
        let request = CompletionRequest::new(
            "qwen/qwen3-coder-next",
            vec![
                ChatCompletionMessage::system("Be Socratic."),
                ChatCompletionMessage::from(&Message::user("hi")),
            ],
            4096,
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({
                "model": "qwen/qwen3-coder-next",
                "messages": [
                    {"role": "system", "content": "Be Socratic."},
                    {"role": "user", "content": "hi"}
                ],
                "stream": true,
                "max_tokens": 4096
            })
        );
    }
}
