//! Input handling for the interactive session
//!
//! The session reads through the [`LineReader`] trait; [`InputHandler`]
//! is the rustyline-backed implementation used by the binary.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Source of user input lines
pub trait LineReader {
    /// Show `prompt` and read one line without its terminator.
    ///
    /// Returns:
    /// - Ok(Some(input)) for normal input
    /// - Ok(None) at end of input
    /// - Err on interrupt or read failure
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

impl<T: LineReader + ?Sized> LineReader for &mut T {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        (**self).read_line(prompt)
    }
}

/// Readline interface with in-memory history and line editing
pub struct InputHandler {
    editor: DefaultEditor,
}

impl InputHandler {
    /// Create new input handler
    pub fn new() -> Result<Self> {
        let editor = DefaultEditor::new()?;
        Ok(InputHandler { editor })
    }
}

impl LineReader for InputHandler {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => Err(anyhow::anyhow!("Interrupted")),
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(anyhow::anyhow!("Readline error: {}", err)),
        }
    }
}
