// Public modules
pub mod chat_completion_message;
pub mod completion_chunk;
pub mod completion_request;
pub mod message;
pub mod transcript;

// Re-exports
pub use chat_completion_message::{ChatCompletionMessage, ChatRole};
pub use completion_chunk::{ChunkChoice, ChunkDelta, CompletionChunk};
pub use completion_request::CompletionRequest;
pub use message::{Message, MessageRole};
pub use transcript::Transcript;
