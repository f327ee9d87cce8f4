//! AIMY - streaming generation client
//!
//! Sends generation requests to a locally hosted inference server and
//! renders the streamed NDJSON reply as it arrives.
//!
//! # Architecture
//!
//! - **types**: typed options and the request envelope
//! - **streaming**: HTTP transport and the bounded NDJSON decoder
//! - **repl**: the interactive turn loop
//! - **cli**, **telemetry**: configuration, arguments, logging

pub mod errors;
pub mod types;
pub mod streaming;

// Re-export commonly used types
pub use errors::{ClientError, Result};

pub mod cli;
pub mod repl;
pub mod telemetry;
