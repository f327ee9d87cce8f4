//! Interactive session loop
//!
//! One turn at a time: read a line, send it, stream the reply, repeat.
//! The sentinel exit word is only checked before a request is built, so
//! a reply in flight always runs to completion.

use colored::Colorize;
use std::io::Write;

use crate::cli::config::Config;
use crate::errors::Result;
use crate::repl::input::LineReader;
use crate::streaming::{GenerateClient, GenerateSummary};
use crate::types::{GenerateRequest, Options};

/// Why a session stopped
#[derive(Debug)]
pub enum SessionEnd {
    /// The user typed the exit word
    Exit,

    /// Input could not be read (EOF, interrupt, terminal failure)
    InputFailed(String),

    /// A turn failed while errors are fatal
    TurnFailed(crate::errors::ClientError),
}

impl SessionEnd {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionEnd::Exit => 0,
            SessionEnd::InputFailed(_) | SessionEnd::TurnFailed(_) => 1,
        }
    }
}

/// Interactive conversation with one model
pub struct Session<R: LineReader, W: Write> {
    reader: R,
    out: W,
    client: GenerateClient,
    config: Config,
    options: Options,
    context: Vec<i64>,
    turns: usize,
}

impl<R: LineReader, W: Write> Session<R, W> {
    /// Create session. The options template is built once from `config`.
    pub fn new(reader: R, out: W, client: GenerateClient, config: Config) -> Self {
        let options = config.options();
        Self {
            reader,
            out,
            client,
            config,
            options,
            context: Vec::new(),
            turns: 0,
        }
    }

    /// Run until the exit word, an input failure, or a fatal turn error
    pub async fn run(&mut self) -> SessionEnd {
        loop {
            let line = match self.reader.read_line(&self.config.session.user_label) {
                Ok(Some(line)) => line,
                Ok(None) => return SessionEnd::InputFailed("end of input".to_string()),
                Err(e) => return SessionEnd::InputFailed(e.to_string()),
            };

            if line == self.config.session.exit_word {
                tracing::info!(turns = self.turns, "exit requested");
                return SessionEnd::Exit;
            }

            if line.trim().is_empty() {
                continue;
            }

            if let Err(e) = self.turn(&line).await {
                if self.config.session.fatal_errors {
                    return SessionEnd::TurnFailed(e);
                }
                tracing::error!(error = %e, "turn failed");
                if let Err(io) = writeln!(self.out) {
                    return SessionEnd::TurnFailed(io.into());
                }
                eprintln!("{}: {}", "Error".red(), e);
            }
        }
    }

    /// Send one prompt and stream the reply to the output
    pub async fn turn(&mut self, prompt: &str) -> Result<GenerateSummary> {
        let request = self.build_request(prompt)?;

        write!(self.out, "{}", self.config.session.assistant_label)?;
        self.out.flush()?;

        let summary = self.client.generate(&request, &mut self.out).await?;
        self.turns += 1;

        if self.config.session.keep_context {
            self.context = summary.context.clone();
        }
        Ok(summary)
    }

    /// Request envelope for `prompt` from the configured model and options
    pub fn build_request(&self, prompt: &str) -> Result<GenerateRequest> {
        let model = &self.config.model;
        let mut request = GenerateRequest::new(model.name.clone(), prompt, &self.options)?
            .with_system(model.system.clone())
            .with_template(model.template.clone())
            .with_format(model.format.clone());

        if self.config.session.keep_context && !self.context.is_empty() {
            request = request.with_context(self.context.clone());
        }
        Ok(request)
    }

    /// Completed turns
    pub fn turns(&self) -> usize {
        self.turns
    }

    /// Context tokens that will accompany the next prompt
    pub fn context(&self) -> &[i64] {
        &self.context
    }

    /// Output sink, e.g. to inspect what was written
    pub fn output(&self) -> &W {
        &self.out
    }
}
