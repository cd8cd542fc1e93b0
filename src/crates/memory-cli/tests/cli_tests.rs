//! End-to-end tests for the chat loop and offline trimming, using the echo
//! model so no credentials are needed.

use memory_cli::build_pipeline;
use memory_cli::chat::run_chat;
use memory_cli::config::{ChatMemoryConfig, CounterKind, ProviderKind};
use memory_cli::trim::{parse_messages, trim_file};
use memory_core::{ApproximateCounter, MessageRole, StartOn, TrimConfig};

fn echo_config() -> ChatMemoryConfig {
    let mut config = ChatMemoryConfig::default();
    config.llm.provider = ProviderKind::Echo;
    config.chat.token_counter = CounterKind::Approximate;
    config.trim = TrimConfig::new(1_000);
    config
}

async fn run_script(config: &ChatMemoryConfig, script: &str) -> String {
    let pipeline = build_pipeline(config).unwrap();
    let mut output = Vec::new();
    run_chat(&pipeline, "chat1", script.as_bytes(), &mut output)
        .await
        .unwrap();
    String::from_utf8(output).unwrap()
}

#[tokio::test]
async fn test_chat_loop_replies_and_shows_history() {
    let output = run_script(&echo_config(), "Hi! I'm Bob\n/history\n/quit\n").await;

    // System prompt + the new human message
    assert!(output.contains("You said: Hi! I'm Bob (window: 2 messages)"));
    assert!(output.contains("Human: Hi! I'm Bob\nAI: You said: Hi! I'm Bob"));
    // The system prompt is applied per call, not stored
    assert!(!output.contains("System:"));
}

#[tokio::test]
async fn test_chat_loop_switches_sessions() {
    let script = "Hi! I'm Bob\n/session chat2\nWhat's my name?\n/sessions\n";
    let output = run_script(&echo_config(), script).await;

    assert!(output.contains("Switched to session chat2"));
    // chat2 starts fresh: system prompt + one human message
    assert!(output.contains("You said: What's my name? (window: 2 messages)"));
    assert!(output.contains("chat1\nchat2"));
    assert!(output.contains("[chat2] > "));
}

#[tokio::test]
async fn test_chat_loop_ends_at_eof() {
    let output = run_script(&echo_config(), "").await;
    assert!(output.starts_with("[chat1] > "));
}

#[tokio::test]
async fn test_tight_budget_trims_window() {
    let mut config = echo_config();
    config.chat.system_prompt = None;
    // Each short message costs 4 overhead + a few tokens; only the newest fits
    config.trim = TrimConfig::new(10);

    let output = run_script(&config, "one\ntwo\nthree\n").await;
    assert_eq!(output.matches("(window: 1 messages)").count(), 3);
}

#[test]
fn test_invalid_trim_config_rejected() {
    let mut config = echo_config();
    config.trim = TrimConfig::new(0);
    assert!(build_pipeline(&config).is_err());
}

#[test]
fn test_groq_without_key_rejected() {
    let mut config = echo_config();
    config.llm.provider = ProviderKind::Groq;
    config.llm.api_key = String::new();
    assert!(build_pipeline(&config).is_err());
}

#[tokio::test]
async fn test_trim_file_command() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("conversation.json");
    tokio::fs::write(
        &path,
        r#"[
            {"role": "system", "content": "be helpful"},
            {"role": "human", "content": "hi, I'm Bob"},
            {"role": "ai", "content": "hi Bob!"},
            {"role": "human", "content": "I like vanilla ice cream"}
        ]"#,
    )
    .await
    .unwrap();

    // system 7, last human 10, ai 6: the ai fits but the window must start on human
    let config = TrimConfig::new(23).with_start_on(StartOn::Human);
    let rendered = trim_file(&path, &config, &ApproximateCounter::default())
        .await
        .unwrap();

    let window = parse_messages(&rendered).unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window[0].role(), MessageRole::System);
    assert_eq!(window[1].content(), "I like vanilla ice cream");
}

#[tokio::test]
async fn test_trim_file_missing() {
    let result = trim_file(
        std::path::Path::new("/nonexistent/conversation.json"),
        &TrimConfig::default(),
        &ApproximateCounter::default(),
    )
    .await;
    assert!(result.is_err());
}
