//! Chat session module for Socratic tutoring conversations.
//!
//! This module provides the conversation core shared by every front end. It
//! supports:
//!
//! - Streaming replies delivered fragment by fragment to a presentation sink
//! - Clearing the conversation, including while a reply is streaming
//! - Layered configuration from defaults, a YAML file, and flags
//! - Slash commands for the terminal REPL
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: transcript ownership and turn orchestration
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{BlockView, InterruptHandle, PlainTextRenderer, PresentationSink};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    ChatArgs, ChatConfig, DEFAULT_API_KEY_ENV, DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS,
    DEFAULT_MODEL, DEFAULT_REFERER, DEFAULT_SYSTEM_PROMPT,
};
pub use session::{ChatSession, SessionStats};
