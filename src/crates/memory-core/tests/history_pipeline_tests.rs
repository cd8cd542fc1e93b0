//! Integration tests for HistoryPipeline
//!
//! Covers session isolation, the append-only audit trail, failure handling,
//! and per-session serialization under concurrent callers.

use async_trait::async_trait;
use futures::future::join_all;
use memory_core::{
    ChatModel, ChatRequest, ChatResponse, HistoryPipeline, MemoryError, Message, MessageRole,
    Result, SessionStore, StartOn, TokenCounter, TrimConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Test doubles
// ============================================================================

/// One token per whitespace-separated word
struct WordCounter;

#[async_trait]
impl TokenCounter for WordCounter {
    async fn count_tokens(&self, messages: &[Message]) -> Result<usize> {
        Ok(messages
            .iter()
            .map(|m| m.content().split_whitespace().count())
            .sum())
    }
}

struct BrokenCounter;

#[async_trait]
impl TokenCounter for BrokenCounter {
    async fn count_tokens(&self, _messages: &[Message]) -> Result<usize> {
        Err(MemoryError::token_counter("tokenizer offline"))
    }
}

/// Word counter that parks on a "block" message until opened
#[derive(Default)]
struct GateCounter {
    entered: Notify,
    release: Notify,
    open: AtomicBool,
}

impl GateCounter {
    fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.release.notify_one();
    }
}

#[async_trait]
impl TokenCounter for GateCounter {
    async fn count_tokens(&self, messages: &[Message]) -> Result<usize> {
        if !self.open.load(Ordering::SeqCst) && messages.iter().any(|m| m.content() == "block") {
            self.entered.notify_one();
            self.release.notified().await;
        }
        WordCounter.count_tokens(messages).await
    }
}

fn last_content(request: &ChatRequest) -> String {
    request
        .messages
        .last()
        .map(|m| m.content().to_string())
        .unwrap_or_default()
}

/// Replies "echo: <last message>" and counts calls
#[derive(Default)]
struct EchoModel {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatModel for EchoModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatResponse::new(Message::ai(format!(
            "echo: {}",
            last_content(&request)
        ))))
    }
}

/// Reports how many human messages are in the window
struct RecallModel;

#[async_trait]
impl ChatModel for RecallModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let humans = request
            .messages
            .iter()
            .filter(|m| m.is(MessageRole::Human))
            .count();
        Ok(ChatResponse::new(Message::ai(format!("humans: {}", humans))))
    }
}

/// Fails exactly one call (1-based), echoes the rest
struct FlakyModel {
    calls: AtomicUsize,
    fail_on: usize,
}

impl FlakyModel {
    fn failing_call(fail_on: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl ChatModel for FlakyModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(MemoryError::model("rate limited"));
        }
        Ok(ChatResponse::new(Message::ai(format!(
            "echo: {}",
            last_content(&request)
        ))))
    }
}

/// Sleeps before echoing
struct SlowModel {
    delay: Duration,
}

#[async_trait]
impl ChatModel for SlowModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        tokio::time::sleep(self.delay).await;
        Ok(ChatResponse::new(Message::ai(format!(
            "echo: {}",
            last_content(&request)
        ))))
    }
}

/// Parks on "block" messages until released; echoes everything else
#[derive(Default)]
struct GateModel {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl ChatModel for GateModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let last = last_content(&request);
        if last == "block" {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(ChatResponse::new(Message::ai(format!("echo: {}", last))))
    }
}

/// Replies "ok" and keeps every window it was sent
#[derive(Default)]
struct RecordingModel {
    windows: parking_lot::Mutex<Vec<Vec<Message>>>,
}

#[async_trait]
impl ChatModel for RecordingModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.windows.lock().push(request.messages);
        Ok(ChatResponse::new(Message::ai("ok")))
    }
}

fn pipeline_with(model: Arc<dyn ChatModel>) -> HistoryPipeline {
    HistoryPipeline::builder(model, Arc::new(WordCounter))
        .trim_config(TrimConfig::new(1_000))
        .build()
        .unwrap()
}

/// Every input is directly followed by its own reply
fn assert_paired(history: &[Message]) {
    assert_eq!(history.len() % 2, 0, "unpaired history: {:?}", history);
    for pair in history.chunks(2) {
        assert_eq!(pair[0].role(), MessageRole::Human);
        assert_eq!(pair[1].role(), MessageRole::Ai);
        assert_eq!(pair[1].content(), format!("echo: {}", pair[0].content()));
    }
}

// ============================================================================
// Basic behavior
// ============================================================================

#[tokio::test]
async fn test_sessions_are_isolated() {
    let pipeline = pipeline_with(Arc::new(RecallModel));

    pipeline
        .invoke("chat1", Message::human("Hi! I'm Bob"))
        .await
        .unwrap();
    let reply = pipeline
        .invoke("chat1", Message::human("What's my name?"))
        .await
        .unwrap();
    assert_eq!(reply.content(), "humans: 2");

    let reply = pipeline
        .invoke("chat2", Message::human("What's my name?"))
        .await
        .unwrap();
    assert_eq!(reply.content(), "humans: 1");

    assert_eq!(pipeline.history("chat1").await.len(), 4);
    assert_eq!(pipeline.history("chat2").await.len(), 2);
}

#[tokio::test]
async fn test_history_grows_by_two_per_success() {
    let model = Arc::new(EchoModel::default());
    // Tight budget: every window is trimmed, the log is not.
    let pipeline = HistoryPipeline::builder(model.clone(), Arc::new(WordCounter))
        .trim_config(TrimConfig::new(4))
        .build()
        .unwrap();

    for i in 0..10 {
        pipeline
            .invoke("s", Message::human(format!("message number {}", i)))
            .await
            .unwrap();
    }

    let history = pipeline.history("s").await;
    assert_eq!(history.len(), 20);
    assert_eq!(model.calls.load(Ordering::SeqCst), 10);
    assert_paired(&history);
}

#[tokio::test]
async fn test_window_is_trimmed_but_history_is_not() {
    let store = Arc::new(SessionStore::new());
    let pipeline = HistoryPipeline::builder(Arc::new(RecallModel), Arc::new(WordCounter))
        .trim_config(TrimConfig::new(6).with_start_on(StartOn::Human))
        .store(Arc::clone(&store))
        .build()
        .unwrap();

    for text in ["one two", "three four", "five six"] {
        pipeline.invoke("s", Message::human(text)).await.unwrap();
    }

    // Budget 6 keeps "seven", the previous reply and "five six".
    let reply = pipeline.invoke("s", Message::human("seven")).await.unwrap();
    assert_eq!(reply.content(), "humans: 2");
    assert_eq!(store.get_or_create("s").len().await, 8);
}

#[tokio::test]
async fn test_stored_system_message_reaches_model_behind_prompt() {
    let model = Arc::new(RecordingModel::default());
    let pipeline = HistoryPipeline::builder(model.clone(), Arc::new(WordCounter))
        .trim_config(TrimConfig::new(1_000))
        .system_prompt("Answer precisely.")
        .build()
        .unwrap();

    let persona = "You are a good assistant. The user is called Lari.";
    pipeline.invoke("s", Message::system(persona)).await.unwrap();
    pipeline
        .invoke("s", Message::human("What is my name?"))
        .await
        .unwrap();

    let windows = model.windows.lock().clone();
    let last: Vec<_> = windows[1]
        .iter()
        .map(|m| (m.role(), m.content().to_string()))
        .collect();
    assert_eq!(
        last,
        vec![
            (MessageRole::System, "Answer precisely.".to_string()),
            (MessageRole::System, persona.to_string()),
            (MessageRole::Human, "What is my name?".to_string()),
        ]
    );

    // The template is applied per call; only the caller's messages are stored.
    let history = pipeline.history("s").await;
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].content(), persona);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_model_failure_keeps_input_then_recovers() {
    let pipeline = pipeline_with(Arc::new(FlakyModel::failing_call(2)));

    pipeline.invoke("s", Message::human("first")).await.unwrap();
    assert_eq!(pipeline.history("s").await.len(), 2);

    let err = pipeline.invoke("s", Message::human("second")).await.unwrap_err();
    assert!(matches!(err, MemoryError::Model(_)));
    assert!(err.is_retryable());

    let history = pipeline.history("s").await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].content(), "second");

    let reply = pipeline.invoke("s", Message::human("third")).await.unwrap();
    assert_eq!(reply.content(), "echo: third");
    assert_eq!(pipeline.history("s").await.len(), 5);
}

#[tokio::test]
async fn test_counter_failure_keeps_input_only() {
    let model = Arc::new(EchoModel::default());
    let pipeline = HistoryPipeline::builder(model.clone(), Arc::new(BrokenCounter))
        .build()
        .unwrap();

    let err = pipeline.invoke("s", Message::human("hi")).await.unwrap_err();
    assert!(matches!(err, MemoryError::TokenCounter(_)));
    assert_eq!(pipeline.history("s").await.len(), 1);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_a_model_failure() {
    let pipeline = HistoryPipeline::builder(
        Arc::new(SlowModel {
            delay: Duration::from_secs(60),
        }),
        Arc::new(WordCounter),
    )
    .timeout(Duration::from_secs(5))
    .build()
    .unwrap();

    let err = pipeline.invoke("s", Message::human("hi")).await.unwrap_err();
    assert!(matches!(err, MemoryError::Timeout(_)));
    assert!(err.is_retryable());

    let history = pipeline.history("s").await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].content(), "hi");
}

#[tokio::test]
async fn test_dropped_call_releases_session() {
    let model = Arc::new(GateModel::default());
    let pipeline = pipeline_with(model.clone());

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        pipeline.invoke("s", Message::human("block")),
    )
    .await;
    assert!(result.is_err());

    let history = pipeline.history("s").await;
    assert_eq!(history.len(), 1);

    let reply = pipeline.invoke("s", Message::human("next")).await.unwrap();
    assert_eq!(reply.content(), "echo: next");
    assert_eq!(pipeline.history("s").await.len(), 3);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_or_create_yields_one_session() {
    let store = Arc::new(SessionStore::new());

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.get_or_create("shared") })
        })
        .collect();

    let sessions: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(store.len(), 1);
    for session in &sessions[1..] {
        assert!(Arc::ptr_eq(&sessions[0], session));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_invokes_on_one_session_never_interleave() {
    let pipeline = Arc::new(pipeline_with(Arc::new(SlowModel {
        delay: Duration::from_millis(10),
    })));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                pipeline
                    .invoke("shared", Message::human(format!("input {}", i)))
                    .await
            })
        })
        .collect();

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let history = pipeline.history("shared").await;
    assert_eq!(history.len(), 16);
    assert_paired(&history);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_blocked_session_does_not_block_others() {
    let model = Arc::new(GateModel::default());
    let pipeline = Arc::new(pipeline_with(model.clone()));

    let blocked = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.invoke("a", Message::human("block")).await })
    };
    model.entered.notified().await;

    // Another session proceeds while "a" is inside the model call.
    let reply = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.invoke("b", Message::human("hello")),
    )
    .await
    .expect("session b was blocked by session a")
    .unwrap();
    assert_eq!(reply.content(), "echo: hello");

    // The same session waits.
    let waiting = tokio::time::timeout(
        Duration::from_millis(50),
        pipeline.invoke("a", Message::human("second")),
    )
    .await;
    assert!(waiting.is_err());

    model.release.notify_one();
    let reply = blocked.await.unwrap().unwrap();
    assert_eq!(reply.content(), "echo: block");

    let history = pipeline.history("a").await;
    assert_eq!(history.len(), 2);
    assert_paired(&history);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_sessions_in_parallel() {
    let model = Arc::new(EchoModel::default());
    let pipeline = Arc::new(pipeline_with(model.clone()));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                let session = format!("session-{}", i % 5);
                pipeline
                    .invoke(&session, Message::human(format!("hello {}", i)))
                    .await
            })
        })
        .collect();

    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    assert_eq!(pipeline.store().len(), 5);
    assert_eq!(model.calls.load(Ordering::SeqCst), 20);
    for id in pipeline.store().session_ids() {
        let history = pipeline.history(&id).await;
        assert_eq!(history.len(), 8);
        assert_paired(&history);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_token_counting_does_not_block_other_sessions() {
    let counter = Arc::new(GateCounter::default());
    let pipeline = Arc::new(
        HistoryPipeline::builder(Arc::new(EchoModel::default()), counter.clone())
            .trim_config(TrimConfig::new(1_000))
            .build()
            .unwrap(),
    );

    let blocked = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.invoke("a", Message::human("block")).await })
    };
    counter.entered.notified().await;

    // "a" is parked inside count_tokens; "b" still completes.
    let reply = tokio::time::timeout(
        Duration::from_secs(5),
        pipeline.invoke("b", Message::human("hello")),
    )
    .await
    .expect("session b was blocked by token counting in session a")
    .unwrap();
    assert_eq!(reply.content(), "echo: hello");

    // A second call on "a" waits for the first to finish.
    let waiting = tokio::time::timeout(
        Duration::from_millis(50),
        pipeline.invoke("a", Message::human("second")),
    )
    .await;
    assert!(waiting.is_err());

    counter.open();
    let reply = blocked.await.unwrap().unwrap();
    assert_eq!(reply.content(), "echo: block");

    let history = pipeline.history("a").await;
    assert_eq!(history.len(), 2);
    assert_paired(&history);
}
