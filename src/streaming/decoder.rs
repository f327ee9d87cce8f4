//! NDJSON stream decoder for generate responses
//!
//! The response body is a sequence of JSON objects, one per line, of
//! unknown total length:
//!
//! ```text
//! {"model":"AIMY3","response":"Hel","done":false}
//! {"model":"AIMY3","response":"lo","done":false}
//! {"model":"AIMY3","response":"","done":true,"context":[1,2,3],"eval_count":2}
//! ```
//!
//! A line carrying a non-empty `error` string ends the stream with that
//! message. Lines are bounded: a line that reaches the decoder capacity
//! is reported as [`ClientError::BufferExceeded`] instead of being
//! truncated or parsed in part.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::{Map, Value};
use std::io::Write;

use crate::errors::{ClientError, Result};

/// Maximum size of a single response line (65535 bytes)
pub const MAX_LINE_BYTES: usize = 65_535;

/// Decoder states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Waiting for the next line
    Reading,

    /// A line failed to decode or carried a server error
    ErrorDetected,

    /// Body exhausted without error
    Done,
}

/// One decoded response line
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    /// `{"error": "..."}` with a non-empty message
    Error(String),

    /// Any other object
    Chunk(GenerateChunk),
}

/// An incremental piece of a generation
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateChunk {
    /// Text fragment, empty when the record has none
    pub response: String,
    /// Set on the final record of a generation
    pub done: bool,
    /// Every field of the record
    pub fields: Map<String, Value>,
}

/// What a completed stream produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateSummary {
    /// All fragments concatenated
    pub text: String,
    /// Whether a `done: true` record was seen
    pub done: bool,
    /// Context tokens from the final record, usable on the next request
    pub context: Vec<i64>,
    pub eval_count: Option<u64>,
    pub prompt_eval_count: Option<u64>,
    /// Nanoseconds spent on the whole generation
    pub total_duration: Option<u64>,
    /// Number of records decoded
    pub records: usize,
}

impl GenerateSummary {
    fn absorb(&mut self, chunk: &GenerateChunk) {
        self.records += 1;
        self.text.push_str(&chunk.response);

        if chunk.done {
            self.done = true;
        }
        if let Some(context) = chunk.fields.get("context").and_then(Value::as_array) {
            self.context = context.iter().filter_map(Value::as_i64).collect();
        }
        if let Some(n) = chunk.fields.get("eval_count").and_then(Value::as_u64) {
            self.eval_count = Some(n);
        }
        if let Some(n) = chunk.fields.get("prompt_eval_count").and_then(Value::as_u64) {
            self.prompt_eval_count = Some(n);
        }
        if let Some(n) = chunk.fields.get("total_duration").and_then(Value::as_u64) {
            self.total_duration = Some(n);
        }
    }
}

/// Bounded line scanner turning body bytes into [`StreamRecord`]s
#[derive(Debug)]
pub struct StreamDecoder {
    /// Bytes received but not yet consumed as lines
    buffer: Vec<u8>,

    /// Position up to which `buffer` is known to hold no newline
    scanned: usize,

    state: DecoderState,

    /// Maximum line capacity, terminator included
    max_line_bytes: usize,
}

impl StreamDecoder {
    /// Create decoder with the default line capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_LINE_BYTES)
    }

    /// Create decoder with a custom line capacity
    pub fn with_capacity(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            scanned: 0,
            state: DecoderState::Reading,
            max_line_bytes,
        }
    }

    /// Current state
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Line capacity this decoder was built with
    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    /// Bytes buffered and not yet returned as records
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Append body bytes. Call [`next_record`](Self::next_record) until it
    /// returns `None` to drain them.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete record.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Every line must hold
    /// a JSON object, so a blank line is a decode error.
    pub fn next_record(&mut self) -> Result<Option<StreamRecord>> {
        if self.state != DecoderState::Reading {
            return Ok(None);
        }

        let newline = self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|offset| self.scanned + offset);

        let Some(end) = newline else {
            self.scanned = self.buffer.len();
            self.check_capacity(self.buffer.len())?;
            return Ok(None);
        };

        self.check_capacity(end)?;

        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        self.scanned = 0;

        self.decode(strip_cr(&line[..line.len() - 1])).map(Some)
    }

    /// Signal end of body and decode a final unterminated line, if any
    pub fn finish(&mut self) -> Result<Option<StreamRecord>> {
        if self.state != DecoderState::Reading {
            return Ok(None);
        }

        self.check_capacity(self.buffer.len())?;

        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;

        // A body ending in a newline leaves nothing behind
        let record = if rest.is_empty() {
            None
        } else {
            Some(self.decode(strip_cr(&rest))?)
        };

        if self.state == DecoderState::Reading {
            self.state = DecoderState::Done;
        }
        Ok(record)
    }

    /// Drain a whole response body, writing each fragment to `out` as it
    /// arrives.
    ///
    /// Ends with a single newline on success. A server-reported error is
    /// returned as [`ClientError::Server`] with the exact message.
    pub async fn decode_stream<S, E, W>(mut self, body: S, out: &mut W) -> Result<GenerateSummary>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Into<ClientError>,
        W: Write,
    {
        let mut body = std::pin::pin!(body);
        let mut summary = GenerateSummary::default();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(bytes) => bytes,
                Err(e) => return Err(e.into()),
            };
            self.feed(&chunk);

            while let Some(record) = self.next_record()? {
                emit(record, &mut summary, out)?;
            }
        }

        if let Some(record) = self.finish()? {
            emit(record, &mut summary, out)?;
        }

        out.write_all(b"\n")?;
        out.flush()?;

        tracing::debug!(
            records = summary.records,
            done = summary.done,
            eval_count = ?summary.eval_count,
            "stream complete"
        );
        Ok(summary)
    }

    fn check_capacity(&mut self, line_len: usize) -> Result<()> {
        if line_len >= self.max_line_bytes {
            self.state = DecoderState::ErrorDetected;
            return Err(ClientError::BufferExceeded {
                limit: self.max_line_bytes,
            });
        }
        Ok(())
    }

    fn decode(&mut self, line: &[u8]) -> Result<StreamRecord> {
        match parse_record(line) {
            Ok(StreamRecord::Error(message)) => {
                self.state = DecoderState::ErrorDetected;
                Ok(StreamRecord::Error(message))
            }
            Ok(record) => Ok(record),
            Err(e) => {
                self.state = DecoderState::ErrorDetected;
                Err(e)
            }
        }
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn emit<W: Write>(record: StreamRecord, summary: &mut GenerateSummary, out: &mut W) -> Result<()> {
    match record {
        StreamRecord::Error(message) => {
            tracing::warn!(error = %message, "server reported an error");
            Err(ClientError::Server(message))
        }
        StreamRecord::Chunk(chunk) => {
            tracing::trace!(fragment = %chunk.response, done = chunk.done, "record");
            if !chunk.response.is_empty() {
                out.write_all(chunk.response.as_bytes())?;
                out.flush()?;
            }
            summary.absorb(&chunk);
            Ok(())
        }
    }
}

/// Drop the carriage return of a CRLF terminator
fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Decode one line into a record
pub fn parse_record(line: &[u8]) -> Result<StreamRecord> {
    let text = std::str::from_utf8(line)
        .map_err(|e| ClientError::Decode(format!("invalid UTF-8 in response line: {}", e)))?;

    let value: Value = serde_json::from_str(text)
        .map_err(|e| ClientError::Decode(format!("unmarshal: {}", e)))?;

    let Value::Object(fields) = value else {
        return Err(ClientError::Decode(format!(
            "expected a JSON object, got: {}",
            text
        )));
    };

    match fields.get("error") {
        None | Some(Value::Null) => {}
        Some(Value::String(message)) => {
            if !message.is_empty() {
                return Ok(StreamRecord::Error(message.clone()));
            }
        }
        Some(other) => {
            return Err(ClientError::Decode(format!(
                "error field is not a string: {}",
                other
            )));
        }
    }

    let response = fields
        .get("response")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let done = fields.get("done").and_then(Value::as_bool).unwrap_or(false);

    Ok(StreamRecord::Chunk(GenerateChunk {
        response,
        done,
        fields,
    }))
}
