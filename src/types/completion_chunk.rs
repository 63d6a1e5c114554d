use serde::{Deserialize, Serialize};

/// One `data:` payload of a streaming chat-completion response.
///
/// Only the text delta is modelled.  Every level defaults, so a payload that
/// lacks `choices`, `delta` or `content` deserializes to "no content" rather
/// than failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionChunk {
    /// Candidate deltas; only the first is used.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A single choice within a [`CompletionChunk`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Incremental update for this choice.
    #[serde(default)]
    pub delta: ChunkDelta,
}

/// Incremental update carried by a [`ChunkChoice`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelta {
    /// Newly generated text, if any.
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionChunk {
    /// Returns the text delta of the first choice when it is present and
    /// non-empty.
    pub fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
    }
}
