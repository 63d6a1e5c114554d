//! Streaming chat session core for a Socratic programming tutor.
//!
//! A [`ChatSession`] keeps the transcript, sends it with a system prompt to an
//! OpenAI-compatible chat-completion endpoint, and streams the reply to a
//! [`PresentationSink`] fragment by fragment.

// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod render;
pub mod sse;
pub mod types;

// Re-exports
pub use chat::{ChatConfig, ChatSession};
pub use client::{CompletionSource, Credential, FragmentStream, StreamingCompletionClient};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use protocol::{JsonLinesSink, RecordingSink, SinkEvent, UiCommand};
pub use render::{BlockView, InterruptHandle, PlainTextRenderer, PresentationSink};
pub use types::*;
