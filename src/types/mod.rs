//! Type definitions module
//!
//! Options and the request envelope sent to the inference server.

pub mod options;
pub mod request;

// Re-export commonly used types
pub use options::{default_options, Options, Runner, WirePolicy};
pub use request::{GenerateRequest, ImageData};
