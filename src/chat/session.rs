//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the transcript,
//! drives one streaming completion per user message, and reports progress to
//! a [`PresentationSink`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures::{StreamExt, future};

use crate::chat::config::ChatConfig;
use crate::client::{CompletionSource, StreamingCompletionClient};
use crate::error::{Error, Result};
use crate::observability::{
    SESSION_CLEARS, SESSION_TURN_DURATION, SESSION_TURNS_COMPLETED, SESSION_TURNS_FAILED,
    SESSION_TURNS_REJECTED,
};
use crate::protocol::UiCommand;
use crate::render::PresentationSink;
use crate::types::{ChatCompletionMessage, Message, Transcript};

/// A chat session that manages conversation state and streaming turns.
///
/// Every method takes `&self`, so a host may clear the conversation while a
/// turn is in flight.  At most one turn runs at a time; a second send while
/// one is streaming is rejected with [`Error::Busy`].
pub struct ChatSession<C: CompletionSource = StreamingCompletionClient> {
    source: C,
    system_prompt: String,
    transcript: Mutex<Transcript>,
    busy: AtomicBool,
    turns_completed: AtomicU64,
    turns_failed: AtomicU64,
    turns_rejected: AtomicU64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    /// The number of messages in the conversation.
    pub message_count: usize,
    /// Turns that ended with an assistant reply.
    pub turns_completed: u64,
    /// Turns that ended with an error.
    pub turns_failed: u64,
    /// Sends rejected because a turn was already streaming.
    pub turns_rejected: u64,
}

impl ChatSession<StreamingCompletionClient> {
    /// Creates a session backed by the HTTP client described by `config`.
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        let client = StreamingCompletionClient::new(config)?;
        Ok(Self::new(client, config.system_prompt.clone()))
    }
}

impl<C: CompletionSource> ChatSession<C> {
    /// Creates a new session with an empty transcript.
    pub fn new(source: C, system_prompt: impl Into<String>) -> Self {
        Self {
            source,
            system_prompt: system_prompt.into(),
            transcript: Mutex::new(Transcript::new()),
            busy: AtomicBool::new(false),
            turns_completed: AtomicU64::new(0),
            turns_failed: AtomicU64::new(0),
            turns_rejected: AtomicU64::new(0),
        }
    }

    /// Sends a user message and streams the reply into `sink`.
    ///
    /// The sink sees one `history` snapshot that includes the new message,
    /// each fragment as it arrives, at most one `error`, then `done`.  The
    /// assistant reply is recorded only when the stream ends cleanly.
    /// Failures are reported to the sink, never to the caller.  While another
    /// reply is streaming the send is rejected with a lone `error`.
    pub async fn send_user_message(&self, text: &str, sink: &mut dyn PresentationSink) {
        let Some(in_flight) = InFlight::acquire(&self.busy) else {
            SESSION_TURNS_REJECTED.click();
            self.turns_rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("rejected message while a reply is streaming");
            sink.error(&Error::Busy.to_string());
            return;
        };
        let started = Instant::now();

        let snapshot = {
            let mut transcript = self.lock_transcript();
            transcript.push(Message::user(text));
            transcript.messages()
        };
        sink.history(&snapshot);

        let mut outbound = Vec::with_capacity(snapshot.len() + 1);
        outbound.push(ChatCompletionMessage::system(self.system_prompt.clone()));
        outbound.extend(snapshot.iter().map(ChatCompletionMessage::from));

        match self.stream_reply(outbound, sink).await {
            Ok(reply) => {
                tracing::debug!(chars = reply.len(), "assistant reply complete");
                self.lock_transcript().push(Message::assistant(reply));
                SESSION_TURNS_COMPLETED.click();
                self.turns_completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                tracing::warn!(error = %err, "chat turn failed");
                SESSION_TURNS_FAILED.click();
                self.turns_failed.fetch_add(1, Ordering::Relaxed);
                sink.error(&err.to_string());
            }
        }
        SESSION_TURN_DURATION.add(started.elapsed().as_secs_f64());
        drop(in_flight);
        sink.done();
    }

    async fn stream_reply(
        &self,
        outbound: Vec<ChatCompletionMessage>,
        sink: &mut dyn PresentationSink,
    ) -> Result<String> {
        let interrupt = sink.interrupt_handle();
        let interrupted = async {
            match &interrupt {
                Some(handle) => handle.triggered().await,
                None => future::pending::<()>().await,
            }
        };
        futures::pin_mut!(interrupted);

        let mut fragments = self.source.stream_completion(outbound);
        let mut reply = String::new();
        loop {
            if sink.should_interrupt() {
                return Err(Error::abort("response interrupted"));
            }
            let fragment = tokio::select! {
                biased;
                () = &mut interrupted => return Err(Error::abort("response interrupted")),
                fragment = fragments.next() => fragment,
            };
            let Some(fragment) = fragment else {
                break;
            };
            let fragment = fragment?;
            reply.push_str(&fragment);
            sink.append(&fragment);
        }
        Ok(reply)
    }

    /// Clears the conversation and emits an empty history snapshot.
    ///
    /// A turn already streaming keeps running; its reply lands in the new,
    /// empty transcript.
    pub fn clear_history(&self, sink: &mut dyn PresentationSink) {
        self.lock_transcript().clear();
        SESSION_CLEARS.click();
        tracing::debug!("conversation cleared");
        sink.history(&[]);
    }

    /// Emits the current transcript, e.g. when a view attaches.
    pub fn replay_history(&self, sink: &mut dyn PresentationSink) {
        let snapshot = self.history();
        sink.history(&snapshot);
    }

    /// Dispatches a command from a UI.  Blank sends are ignored.
    pub async fn handle_command(&self, command: UiCommand, sink: &mut dyn PresentationSink) {
        match command {
            UiCommand::Send { text } => {
                let text = text.trim();
                if text.is_empty() {
                    return;
                }
                self.send_user_message(text, sink).await;
            }
            UiCommand::Clear => self.clear_history(sink),
        }
    }

    /// Returns a snapshot of the transcript.
    pub fn history(&self) -> Vec<Message> {
        self.lock_transcript().messages()
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.lock_transcript().len()
    }

    /// Returns the system prompt sent ahead of every request.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Returns true while a turn is streaming.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            message_count: self.message_count(),
            turns_completed: self.turns_completed.load(Ordering::Relaxed),
            turns_failed: self.turns_failed.load(Ordering::Relaxed),
            turns_rejected: self.turns_rejected.load(Ordering::Relaxed),
        }
    }

    fn lock_transcript(&self) -> MutexGuard<'_, Transcript> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the busy flag for the duration of a turn.
///
/// Released on drop, so a turn future that is dropped mid-stream does not
/// wedge the session.
struct InFlight<'a> {
    busy: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    fn acquire(busy: &'a AtomicBool) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { busy })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
