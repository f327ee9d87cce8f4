//! Streaming client module
//!
//! Provides the generate endpoint client and the bounded NDJSON decoder.

pub mod client;
pub mod decoder;

// Re-export commonly used types
pub use client::{Endpoint, GenerateClient, DEFAULT_HOST, DEFAULT_PATH};
pub use decoder::{DecoderState, GenerateChunk, GenerateSummary, StreamDecoder, StreamRecord, MAX_LINE_BYTES};
