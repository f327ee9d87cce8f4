//! Interactive session tests with scripted input and a mock server.

use aimy::cli::Config;
use aimy::repl::{LineReader, Session, SessionEnd};
use aimy::streaming::{Endpoint, GenerateClient};
use aimy::ClientError;
use serde_json::json;
use std::collections::VecDeque;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replays fixed lines, then reports end of input
struct ScriptedInput {
    lines: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedInput {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| l.to_string()).collect(),
            prompts: Vec::new(),
        }
    }
}

impl LineReader for ScriptedInput {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front())
    }
}

/// Fails like a closed terminal
struct BrokenInput;

impl LineReader for BrokenInput {
    fn read_line(&mut self, _prompt: &str) -> anyhow::Result<Option<String>> {
        Err(anyhow::anyhow!("Interrupted"))
    }
}

fn ndjson(status: u16, body: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(body.as_bytes().to_vec(), "application/x-ndjson")
}

fn client_for(server: &MockServer) -> GenerateClient {
    GenerateClient::with_endpoint(Endpoint::new(server.address().to_string(), "/api/generate")).unwrap()
}

fn output<R: LineReader>(session: &Session<R, Vec<u8>>) -> String {
    String::from_utf8(session.output().clone()).unwrap()
}

#[tokio::test]
async fn test_exit_word_ends_without_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ndjson(200, "{\"response\":\"x\"}\n"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut session = Session::new(
        ScriptedInput::new(&["exit"]),
        Vec::new(),
        client_for(&mock_server),
        Config::default(),
    );
    let end = session.run().await;

    assert!(matches!(end, SessionEnd::Exit));
    assert_eq!(end.exit_code(), 0);
    assert_eq!(session.turns(), 0);
    assert!(output(&session).is_empty());
}

#[tokio::test]
async fn test_exit_word_must_match_exactly() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ndjson(200, "{\"response\":\"bye\"}\n"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut session = Session::new(
        ScriptedInput::new(&["exit please", "exit"]),
        Vec::new(),
        client_for(&mock_server),
        Config::default(),
    );
    let end = session.run().await;

    assert_eq!(end.exit_code(), 0);
    assert_eq!(session.turns(), 1);
    assert_eq!(output(&session), "AIMY: bye\n");
}

#[tokio::test]
async fn test_turns_stream_with_labels() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ndjson(
            200,
            "{\"response\":\"Hel\"}\n{\"response\":\"lo\"}\n{\"done\":true}\n",
        ))
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut input = ScriptedInput::new(&["hi", "", "again", "exit"]);
    let mut session = Session::new(&mut input, Vec::new(), client_for(&mock_server), Config::default());
    let end = session.run().await;

    assert!(matches!(end, SessionEnd::Exit));
    assert_eq!(output(&session), "AIMY: Hello\nAIMY: Hello\n");
    drop(session);
    assert!(input.prompts.iter().all(|p| p == "YOU: "));
    assert_eq!(input.prompts.len(), 4);
}

#[tokio::test]
async fn test_http_error_status_ends_session() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ndjson(500, "{\"error\":\"internal\"}\n"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut session = Session::new(
        ScriptedInput::new(&["hi", "exit"]),
        Vec::new(),
        client_for(&mock_server),
        Config::default(),
    );
    let end = session.run().await;

    assert_eq!(end.exit_code(), 1);
    match end {
        SessionEnd::TurnFailed(ClientError::HttpStatus { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "internal");
        }
        other => panic!("expected HttpStatus failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_ends_session_by_default() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ndjson(200, "{\"error\":\"model not found\"}\n"))
        .mount(&mock_server)
        .await;

    let mut session = Session::new(
        ScriptedInput::new(&["hi", "exit"]),
        Vec::new(),
        client_for(&mock_server),
        Config::default(),
    );
    let end = session.run().await;

    assert!(matches!(end, SessionEnd::TurnFailed(ClientError::Server(ref m)) if m == "model not found"));
    assert_eq!(end.exit_code(), 1);
}

#[tokio::test]
async fn test_recoverable_errors_keep_session_alive() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ndjson(200, "{\"error\":\"model not found\"}\n"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut config = Config::default();
    config.session.fatal_errors = false;

    let mut session = Session::new(
        ScriptedInput::new(&["one", "two", "exit"]),
        Vec::new(),
        client_for(&mock_server),
        config,
    );
    let end = session.run().await;

    assert!(matches!(end, SessionEnd::Exit));
    assert_eq!(session.turns(), 0);
}

#[tokio::test]
async fn test_end_of_input_is_failure() {
    let mock_server = MockServer::start().await;

    let mut session = Session::new(ScriptedInput::new(&[]), Vec::new(), client_for(&mock_server), Config::default());
    let end = session.run().await;

    assert!(matches!(end, SessionEnd::InputFailed(_)));
    assert_eq!(end.exit_code(), 1);
}

#[tokio::test]
async fn test_read_failure_is_failure() {
    let mock_server = MockServer::start().await;

    let mut session = Session::new(BrokenInput, Vec::new(), client_for(&mock_server), Config::default());
    let end = session.run().await;

    assert!(matches!(end, SessionEnd::InputFailed(ref reason) if reason == "Interrupted"));
}

#[tokio::test]
async fn test_context_carried_between_turns() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "context": [4, 2] })))
        .respond_with(ndjson(200, "{\"response\":\"second\",\"done\":true}\n"))
        .with_priority(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ndjson(
            200,
            "{\"response\":\"first\"}\n{\"done\":true,\"context\":[4,2]}\n",
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = Config::default();
    config.session.keep_context = true;

    let mut session = Session::new(
        ScriptedInput::new(&["a", "b", "exit"]),
        Vec::new(),
        client_for(&mock_server),
        config,
    );
    let end = session.run().await;

    assert!(matches!(end, SessionEnd::Exit));
    assert_eq!(output(&session), "AIMY: first\nAIMY: second\n");
}

#[test]
fn test_build_request_uses_model_config() {
    let mut config = Config::default();
    config.model.system = "You are AIMY".to_string();
    config.model.format = "json".to_string();
    config.options.temperature = Some(0.3);

    let client = GenerateClient::new().unwrap();
    let session = Session::new(ScriptedInput::new(&[]), Vec::new(), client, config);
    let request = session.build_request("hello").unwrap();
    let body: serde_json::Value = serde_json::from_slice(&request.to_json_bytes().unwrap()).unwrap();

    assert_eq!(body["model"], "AIMY3");
    assert_eq!(body["system"], "You are AIMY");
    assert_eq!(body["format"], "json");
    assert_eq!(body["options"]["temperature"], 0.3);
    assert!(body.get("context").is_none());
}

/// Output sink that rejects every write
struct ClosedOutput;

impl std::io::Write for ClosedOutput {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "output closed"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_closed_output_ends_recoverable_session() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ndjson(200, "{\"response\":\"x\"}\n"))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut config = Config::default();
    config.session.fatal_errors = false;

    let mut session = Session::new(
        ScriptedInput::new(&["hi", "exit"]),
        ClosedOutput,
        client_for(&mock_server),
        config,
    );
    let end = session.run().await;

    assert!(matches!(end, SessionEnd::TurnFailed(ClientError::Io(ref e)) if e.kind() == std::io::ErrorKind::BrokenPipe));
    assert_eq!(end.exit_code(), 1);
    assert_eq!(session.turns(), 0);
}

#[tokio::test]
async fn test_error_status_body_is_read_up_to_line_capacity() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ndjson(502, &"x".repeat(100_000)))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).with_max_line_bytes(128);
    let mut session = Session::new(ScriptedInput::new(&["hi"]), Vec::new(), client, Config::default());
    let end = session.run().await;

    match end {
        SessionEnd::TurnFailed(ClientError::HttpStatus { status, message }) => {
            assert_eq!(status, 502);
            assert_eq!(message.len(), 128);
        }
        other => panic!("expected HttpStatus failure, got {:?}", other),
    }
}
