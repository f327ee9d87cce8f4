//! REPL (Read-Eval-Print Loop) module for the interactive terminal
//!
//! Reads one prompt per turn, streams the reply, and stops on the exit
//! word or on the first failure when errors are fatal.

pub mod input;
pub mod session;

pub use input::{InputHandler, LineReader};
pub use session::{Session, SessionEnd};
