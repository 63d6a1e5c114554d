//! Message protocol between the chat session and an external UI.
//!
//! The session emits [`SinkEvent`]s and accepts [`UiCommand`]s.  Both have a
//! JSON form tagged by `type`, so a UI living in another process can drive a
//! session over any line-oriented channel:
//!
//! ```text
//! -> {"type":"send","text":"What is recursion?"}
//! <- {"type":"history","messages":[{"role":"user","content":"What is recursion?"}]}
//! <- {"type":"append","content":"What do you"}
//! <- {"type":"append","content":" think happens..."}
//! <- {"type":"done"}
//! ```

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::render::PresentationSink;
use crate::types::Message;

/// An event emitted to the presentation sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkEvent {
    /// Full transcript snapshot.
    History {
        /// Every message of the transcript, in order.
        messages: Vec<Message>,
    },
    /// Incremental assistant text.
    Append {
        /// The fragment.
        content: String,
    },
    /// Human-readable failure message.
    Error {
        /// Display text.
        text: String,
    },
    /// The turn finished, successfully or not.
    Done,
}

/// A command accepted from the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UiCommand {
    /// Send a user message.
    Send {
        /// The message text.
        text: String,
    },
    /// Clear the conversation.
    Clear,
}

impl UiCommand {
    /// Parse one JSON command line.
    pub fn from_json(line: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// A sink that records every event, in order.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Vec<SinkEvent>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events.
    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    /// Consumes the sink and returns the recorded events.
    pub fn into_events(self) -> Vec<SinkEvent> {
        self.events
    }

    /// Returns the concatenation of every `append` event.
    pub fn appended_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Append { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns the text of every `error` event.
    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Error { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl PresentationSink for RecordingSink {
    fn history(&mut self, messages: &[Message]) {
        self.events.push(SinkEvent::History {
            messages: messages.to_vec(),
        });
    }

    fn append(&mut self, text: &str) {
        self.events.push(SinkEvent::Append {
            content: text.to_string(),
        });
    }

    fn error(&mut self, text: &str) {
        self.events.push(SinkEvent::Error {
            text: text.to_string(),
        });
    }

    fn done(&mut self) {
        self.events.push(SinkEvent::Done);
    }
}

/// A sink that writes each event as one line of JSON.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Creates a sink writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, event: &SinkEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(error = %err, "could not serialize sink event");
                return;
            }
        };
        if let Err(err) = writeln!(self.writer, "{line}").and_then(|()| self.writer.flush()) {
            tracing::warn!(error = %err, "could not write sink event");
        }
    }
}

impl<W: Write + Send> PresentationSink for JsonLinesSink<W> {
    fn history(&mut self, messages: &[Message]) {
        self.emit(&SinkEvent::History {
            messages: messages.to_vec(),
        });
    }

    fn append(&mut self, text: &str) {
        self.emit(&SinkEvent::Append {
            content: text.to_string(),
        });
    }

    fn error(&mut self, text: &str) {
        self.emit(&SinkEvent::Error {
            text: text.to_string(),
        });
    }

    fn done(&mut self) {
        self.emit(&SinkEvent::Done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_wire_format() {
        let events = vec![
            SinkEvent::History {
                messages: vec![Message::user("hi")],
            },
            SinkEvent::Append {
                content: "Hel".to_string(),
            },
            SinkEvent::Error {
                text: "boom".to_string(),
            },
            SinkEvent::Done,
        ];
        let json: Vec<String> = events
            .iter()
            .map(|event| serde_json::to_string(event).unwrap())
            .collect();
        assert_eq!(
            json,
            vec![
                r#"{"type":"history","messages":[{"role":"user","content":"hi"}]}"#,
                r#"{"type":"append","content":"Hel"}"#,
                r#"{"type":"error","text":"boom"}"#,
                r#"{"type":"done"}"#,
            ]
        );
    }

    #[test]
    fn command_wire_format() {
        assert_eq!(
            UiCommand::from_json(r#"{"type":"send","text":"What is a monad?"}"#).unwrap(),
            UiCommand::Send {
                text: "What is a monad?".to_string()
            }
        );
        assert_eq!(
            UiCommand::from_json(r#"{"type":"clear"}"#).unwrap(),
            UiCommand::Clear
        );
        assert!(UiCommand::from_json(r#"{"type":"send"}"#).is_err());
        assert!(UiCommand::from_json(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn json_lines_sink_writes_one_event_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.append("a");
        sink.done();
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            output,
            "{\"type\":\"append\",\"content\":\"a\"}\n{\"type\":\"done\"}\n"
        );
    }

    #[test]
    fn recording_sink_helpers() {
        let mut sink = RecordingSink::new();
        sink.append("one ");
        sink.error("nope");
        sink.append("two");
        assert_eq!(sink.appended_text(), "one two");
        assert_eq!(sink.errors(), vec!["nope"]);
        assert_eq!(sink.events().len(), 3);
    }
}
