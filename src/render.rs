//! Output rendering for chat sessions.
//!
//! [`PresentationSink`] is the seam between the chat session and whatever
//! displays the conversation.  This module provides a terminal renderer and
//! a small view model; JSON and recording sinks live in
//! [`crate::protocol`].

use std::io::{self, Stdout, Write};
use std::sync::Arc;

use tokio::sync::watch;

use crate::types::{Message, MessageRole};

/// ANSI escape code for dim text (used for informational lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the user label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Level-triggered interrupt request for an in-flight turn.
///
/// Clones share one flag.  A signal handler calls [`InterruptHandle::trigger`];
/// the session waits on it alongside the reply stream, so an interrupt lands
/// even while no bytes are arriving.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl InterruptHandle {
    /// Creates an untriggered handle.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Requests an interrupt.  Safe to call from any thread.
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Clears a previous request, typically before reading the next input.
    pub fn reset(&self) {
        self.sender.send_replace(false);
    }

    /// Returns true if an interrupt has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once an interrupt has been requested.
    pub async fn triggered(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns on trigger.
        let _ = receiver.wait_for(|requested| *requested).await;
    }
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver of the events a chat session emits.
///
/// For every turn the session emits, in order: one `history` snapshot, zero
/// or more `append` fragments, at most one `error`, and exactly one `done`.
/// A send rejected because another turn is streaming is not a turn: it gets
/// a single `error` and no `done`.
pub trait PresentationSink: Send {
    /// Full transcript snapshot.
    fn history(&mut self, messages: &[Message]);

    /// Incremental assistant text.
    ///
    /// The sink decides where the text goes; the usual rule is to extend the
    /// most recent block when it is an assistant block and to open a new
    /// assistant block otherwise.
    fn append(&mut self, text: &str);

    /// Human-readable failure message for the current turn.
    fn error(&mut self, text: &str);

    /// The turn is over; input may be re-enabled.
    fn done(&mut self);

    /// Returns true if the in-flight turn should be abandoned.
    ///
    /// Checked before waiting for each fragment.
    fn should_interrupt(&self) -> bool {
        false
    }

    /// Returns a handle the session can wait on while the reply stalls.
    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        None
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    label: String,
    in_reply: bool,
    line_start: bool,
    interrupt: Option<InterruptHandle>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            label: "Tutor".to_string(),
            in_reply: false,
            line_start: true,
            interrupt: None,
        }
    }

    /// Sets the label printed before each assistant reply.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Attaches an interrupt handle, typically triggered from a Ctrl-C handler.
    pub fn with_interrupt(mut self, interrupt: InterruptHandle) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    /// Print an informational message.
    pub fn print_info(&mut self, info: &str) {
        self.close_reply();
        if self.use_color {
            println!("{ANSI_DIM}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
        self.flush();
    }

    /// Print a full transcript.
    pub fn print_transcript(&mut self, messages: &[Message]) {
        self.close_reply();
        if messages.is_empty() {
            self.print_info("(no messages yet)");
            return;
        }
        for message in messages {
            let (label, color) = match message.role {
                MessageRole::User => ("You", ANSI_GREEN),
                MessageRole::Assistant => (self.label.as_str(), ANSI_CYAN),
            };
            if self.use_color {
                println!("{color}{label}:{ANSI_RESET} {}", message.content);
            } else {
                println!("{label}: {}", message.content);
            }
        }
        self.flush();
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn close_reply(&mut self) {
        if !self.line_start {
            println!();
            self.line_start = true;
        }
        self.in_reply = false;
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PresentationSink for PlainTextRenderer {
    fn history(&mut self, messages: &[Message]) {
        // The terminal already shows what the user typed.
        if messages.is_empty() {
            self.print_info("Conversation cleared.");
        }
    }

    fn append(&mut self, text: &str) {
        if !self.in_reply {
            self.close_reply();
            if self.use_color {
                print!("{ANSI_CYAN}{}:{ANSI_RESET} ", self.label);
            } else {
                print!("{}: ", self.label);
            }
            self.in_reply = true;
        }
        print!("{text}");
        if !text.is_empty() {
            self.line_start = text.ends_with('\n');
        }
        self.flush();
    }

    fn error(&mut self, text: &str) {
        self.close_reply();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {text}{ANSI_RESET}");
        } else {
            eprintln!("Error: {text}");
        }
    }

    fn done(&mut self) {
        self.close_reply();
        self.flush();
    }

    fn should_interrupt(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(InterruptHandle::is_triggered)
    }

    fn interrupt_handle(&self) -> Option<InterruptHandle> {
        self.interrupt.clone()
    }
}

/// Kind of a rendered block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// A user message.
    User,
    /// An assistant reply, possibly still streaming.
    Assistant,
    /// A failure notice.
    Error,
}

/// One visual block of a conversation view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// What the block shows.
    pub kind: BlockKind,
    /// Its text.
    pub text: String,
}

impl Block {
    fn new(kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// View model that turns sink events into a list of blocks.
///
/// A `history` snapshot replaces the blocks; `append` extends the last block
/// when it is an assistant block and opens one otherwise; `error` adds a
/// distinct error block.
#[derive(Debug, Default, Clone)]
pub struct BlockView {
    blocks: Vec<Block>,
    input_enabled: bool,
}

impl BlockView {
    /// Creates an empty view with input enabled.
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            input_enabled: true,
        }
    }

    /// Returns the rendered blocks.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Disables input until the next `done`, as a UI does when it sends.
    pub fn begin_send(&mut self) {
        self.input_enabled = false;
    }

    /// Returns true if the view accepts input.
    pub fn input_enabled(&self) -> bool {
        self.input_enabled
    }
}

impl PresentationSink for BlockView {
    fn history(&mut self, messages: &[Message]) {
        self.blocks = messages
            .iter()
            .map(|message| {
                let kind = match message.role {
                    MessageRole::User => BlockKind::User,
                    MessageRole::Assistant => BlockKind::Assistant,
                };
                Block::new(kind, message.content.clone())
            })
            .collect();
    }

    fn append(&mut self, text: &str) {
        match self.blocks.last_mut() {
            Some(block) if block.kind == BlockKind::Assistant => block.text.push_str(text),
            _ => self.blocks.push(Block::new(BlockKind::Assistant, text)),
        }
    }

    fn error(&mut self, text: &str) {
        self.blocks.push(Block::new(BlockKind::Error, text));
        self.input_enabled = true;
    }

    fn done(&mut self) {
        self.input_enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renderer_default_has_color() {
        let renderer = PlainTextRenderer::new();
        assert!(renderer.use_color);
        assert!(!renderer.should_interrupt());
    }

    #[test]
    fn renderer_without_color() {
        let renderer = PlainTextRenderer::with_color(false);
        assert!(!renderer.use_color);
    }

    #[test]
    fn renderer_interrupt_handle() {
        let interrupt = InterruptHandle::new();
        let renderer = PlainTextRenderer::with_color(false).with_interrupt(interrupt.clone());
        assert!(!renderer.should_interrupt());
        interrupt.trigger();
        assert!(renderer.should_interrupt());
        assert!(renderer.interrupt_handle().is_some_and(|h| h.is_triggered()));
        interrupt.reset();
        assert!(!renderer.should_interrupt());
    }

    #[tokio::test]
    async fn triggered_resolves_after_trigger() {
        let interrupt = InterruptHandle::new();
        let waiter = interrupt.clone();
        let trigger = async {
            tokio::task::yield_now().await;
            interrupt.trigger();
        };
        tokio::join!(waiter.triggered(), trigger);
        assert!(waiter.is_triggered());
        // Already triggered: resolves immediately.
        waiter.triggered().await;
    }

    #[test]
    fn view_appends_to_trailing_assistant_block() {
        let mut view = BlockView::new();
        view.begin_send();
        assert!(!view.input_enabled());

        view.history(&[Message::user("hi")]);
        view.append("Hel");
        view.append("lo");
        view.done();

        assert_eq!(
            view.blocks(),
            &[
                Block::new(BlockKind::User, "hi"),
                Block::new(BlockKind::Assistant, "Hello"),
            ]
        );
        assert!(view.input_enabled());
    }

    #[test]
    fn view_history_replaces_blocks() {
        let mut view = BlockView::new();
        view.history(&[Message::user("a")]);
        view.append("b");
        view.history(&[]);
        assert!(view.blocks().is_empty());
    }

    #[test]
    fn view_errors_are_distinct_blocks() {
        let mut view = BlockView::new();
        view.begin_send();
        view.history(&[Message::user("hi")]);
        view.append("partial");
        view.error("Streaming error: reset");
        view.append("next");

        let kinds: Vec<BlockKind> = view.blocks().iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::User,
                BlockKind::Assistant,
                BlockKind::Error,
                BlockKind::Assistant
            ]
        );
        assert!(view.input_enabled());
    }
}
