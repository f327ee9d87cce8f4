//! AIMY - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use aimy::{
    cli::{Args, Config},
    repl::{InputHandler, Session, SessionEnd},
    streaming::GenerateClient,
    telemetry,
};

/// Load configuration and build the session's collaborators
fn setup(args: &Args) -> Result<(Config, GenerateClient)> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate()?;

    let client = GenerateClient::with_endpoint(config.endpoint())?
        .with_max_line_bytes(config.stream.max_line_bytes);

    tracing::info!(
        url = %client.url(),
        model = %config.model.name,
        "client ready"
    );
    Ok((config, client))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    telemetry::init(args.verbose);

    let (config, client) = match setup(&args) {
        Ok(parts) => parts,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    let input = match InputHandler::new() {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Error reading input: {}", e);
            std::process::exit(1);
        }
    };

    let mut session = Session::new(input, std::io::stdout(), client, config);
    let end = session.run().await;

    match &end {
        SessionEnd::Exit => {}
        SessionEnd::InputFailed(reason) => eprintln!("Error reading input: {}", reason),
        SessionEnd::TurnFailed(e) => eprintln!("\n{}: {}", "Error".red(), e),
    }

    std::process::exit(end.exit_code());
}
