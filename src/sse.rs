//! Server-Sent Events (SSE) processing for streaming completions.
//!
//! The completion endpoint frames its body as `data: <json>` lines.  This
//! module turns the raw byte stream into a stream of text fragments.  Chunk
//! boundaries are arbitrary: a multi-byte character or a whole line may be
//! split across two reads, so [`EventDecoder`] carries undecoded bytes and
//! unterminated line text from one chunk to the next.

use std::collections::VecDeque;
use std::error;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS, STREAM_FRAGMENTS, STREAM_MALFORMED_LINES};
use crate::types::CompletionChunk;
use crate::{Error, Result};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Classification of a single line of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLine {
    /// Not a `data: ` line (comments, `event:` lines, blank separators).
    Ignored,
    /// The `[DONE]` sentinel.  Advisory only; it does not end the stream.
    Done,
    /// A `data: ` line whose payload is not a completion chunk.
    Malformed,
    /// A well-formed chunk that carries no text.
    Empty,
    /// A well-formed chunk carrying text.
    Fragment(String),
}

/// Classify one line (without its terminator).
pub fn classify_line(line: &str) -> DataLine {
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return DataLine::Ignored;
    };
    if payload == DONE_SENTINEL {
        return DataLine::Done;
    }
    match serde_json::from_str::<CompletionChunk>(payload) {
        Ok(chunk) => match chunk.into_text() {
            Some(text) => DataLine::Fragment(text),
            None => DataLine::Empty,
        },
        Err(err) => {
            tracing::trace!(error = %err, payload, "dropping malformed data line");
            DataLine::Malformed
        }
    }
}

/// Incremental decoder for the completion event stream.
///
/// Feed it raw body chunks with [`EventDecoder::decode`] and call
/// [`EventDecoder::finish`] once the transport reports end-of-stream.
#[derive(Debug, Default)]
pub struct EventDecoder {
    carry: Vec<u8>,
    line: String,
}

impl EventDecoder {
    /// Creates a decoder with no buffered state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk and return the fragments of every line it completes.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.decode_text(chunk);
        self.line.push_str(&text);
        self.drain_lines()
    }

    /// Flush buffered state at end-of-stream.
    ///
    /// A dangling partial character becomes U+FFFD and a final line without a
    /// terminator is still processed.
    pub fn finish(&mut self) -> Vec<String> {
        if !self.carry.is_empty() {
            self.carry.clear();
            self.line.push(char::REPLACEMENT_CHARACTER);
        }
        let mut fragments = self.drain_lines();
        let line = std::mem::take(&mut self.line);
        if !line.is_empty() {
            Self::process_line(line.trim_end_matches('\r'), &mut fragments);
        }
        fragments
    }

    fn decode_text(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);
        let mut text = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        while !rest.is_empty() {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[len..];
                        }
                        None => {
                            // Incomplete sequence at the end of the chunk.
                            self.carry = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut fragments = Vec::new();
        while let Some(newline) = self.line.find('\n') {
            let line: String = self.line.drain(..=newline).collect();
            Self::process_line(line.trim_end_matches(['\r', '\n']), &mut fragments);
        }
        fragments
    }

    fn process_line(line: &str, fragments: &mut Vec<String>) {
        match classify_line(line) {
            DataLine::Fragment(text) => fragments.push(text),
            DataLine::Malformed => STREAM_MALFORMED_LINES.click(),
            DataLine::Done => tracing::trace!("saw [DONE] sentinel"),
            DataLine::Empty | DataLine::Ignored => {}
        }
    }
}

struct SseState<S> {
    stream: S,
    decoder: EventDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Process a stream of bytes into a stream of text fragments.
///
/// Fragments are yielded in wire order.  The stream ends when the byte
/// stream ends; a read error is yielded once and then the stream ends.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: error::Error + Send + Sync + 'static,
{
    let state = SseState {
        stream: byte_stream,
        decoder: EventDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                STREAM_FRAGMENTS.click();
                return Some((Ok(fragment), state));
            }
            if state.finished {
                return None;
            }

            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    STREAM_BYTES.count(bytes.len() as u64);
                    let fragments = state.decoder.decode(&bytes);
                    state.pending.extend(fragments);
                }
                Some(Err(err)) => {
                    STREAM_ERRORS.click();
                    state.finished = true;
                    let err = Error::streaming(
                        format!("Error in HTTP stream: {err}"),
                        Some(Box::new(err)),
                    );
                    return Some((Err(err), state));
                }
                None => {
                    state.finished = true;
                    let fragments = state.decoder.finish();
                    state.pending.extend(fragments);
                }
            }
        }
    })
}
