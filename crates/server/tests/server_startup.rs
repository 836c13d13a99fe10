use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Write a one-trial static corpus
fn corpus_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        b"TRIAL ID: T1\nNAME: Test Trial\nCONTACT: Dr. Test, 555-0100\nbreast cancer, stage II\n",
    )
    .unwrap();
    file.flush().unwrap();
    file
}

/// Create a minimal valid config backed by a static corpus
fn minimal_config(port: u16, corpus: &Path) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[llm]
api_key = "sk-startup-test"

[trial_source]
backend = "static_corpus"

[trial_source.static_corpus]
path = "{}"
"#,
        port,
        corpus.display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_trialmatch"))
        .env("TRIALMATCH_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Run the server to completion and report whether it exited successfully
async fn run_to_exit(config_path: &Path) -> bool {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_trialmatch"))
            .env("TRIALMATCH_CONFIG", config_path)
            .env("RUST_LOG", "error")
            .env_remove("ANTHROPIC_API_KEY")
            .env_remove("TRIALMATCH_LLM__API_KEY")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    result.status.success()
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let corpus = corpus_file();
    let config = write_config(&minimal_config(port, corpus.path()));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    // Cleanup
    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let port = get_available_port();
    let corpus = corpus_file();
    let config = write_config(&minimal_config(port, corpus.path()));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body = response.text().await.expect("Failed to read body");
    assert!(!body.contains("sk-startup-test"));

    let json: serde_json::Value = serde_json::from_str(&body).expect("Failed to parse JSON");
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["llm"]["api_key_configured"], true);
    assert_eq!(json["trial_source"]["backend"], "static_corpus");

    // Cleanup
    server.kill().await.ok();
}

#[tokio::test]
async fn test_source_status_reports_corpus() {
    let port = get_available_port();
    let corpus = corpus_file();
    let config = write_config(&minimal_config(port, corpus.path()));

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let json: serde_json::Value = Client::new()
        .get(format!("http://127.0.0.1:{}/api/v1/source/status", port))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse JSON");

    assert_eq!(json["source"], "static_corpus");
    assert_eq!(json["online"], true);
    assert_eq!(json["detail"], "1 trials loaded");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    assert!(!run_to_exit(Path::new("/nonexistent/config.toml")).await);
}

#[tokio::test]
async fn test_missing_trial_source_section_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 8080

[llm]
api_key = "sk-test"
"#,
    );

    assert!(!run_to_exit(config.path()).await);
}

#[tokio::test]
async fn test_missing_llm_credentials_exits_with_error() {
    let corpus = corpus_file();
    let config = write_config(&format!(
        r#"
[server]
port = {}

[trial_source]
backend = "static_corpus"

[trial_source.static_corpus]
path = "{}"
"#,
        get_available_port(),
        corpus.path().display()
    ));

    assert!(!run_to_exit(config.path()).await);
}

#[tokio::test]
async fn test_unreadable_corpus_exits_with_error() {
    let config = write_config(
        r#"
[llm]
api_key = "sk-test"

[trial_source]
backend = "static_corpus"

[trial_source.static_corpus]
path = "/nonexistent/clinical_trials.txt"
"#,
    );

    assert!(!run_to_exit(config.path()).await);
}
