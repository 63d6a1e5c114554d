use serde::{Deserialize, Serialize};

use crate::types::Message;

/// The ordered conversation history.
///
/// A transcript only grows by appending; the only way to remove a message is
/// to clear the whole thing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<Message>);

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns a snapshot of the messages.
    pub fn messages(&self) -> Vec<Message> {
        self.0.clone()
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.0.push(message)
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.0.clear()
    }

    /// Returns the number of messages.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the transcript holds no messages.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;

    #[test]
    fn push_and_clear() {
        let mut transcript = Transcript::new();
        assert!(transcript.is_empty());

        transcript.push(Message::user("hi"));
        transcript.push(Message::assistant("hello"));
        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript.messages().last().map(|m| m.role),
            Some(MessageRole::Assistant)
        );

        let snapshot = transcript.messages();
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn serializes_as_a_plain_array() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("hi"));
        assert_eq!(
            serde_json::to_string(&transcript).unwrap(),
            r#"[{"role":"user","content":"hi"}]"#
        );
    }
}
