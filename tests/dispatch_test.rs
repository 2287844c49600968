//! Dispatch Integration Tests
//! Run with: cargo test --test dispatch_test

use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use ping_bot::application::runner::{self, RunStats, RunnerOptions};
use ping_bot::bootstrap::{build_dispatcher, default_registry};
use ping_bot::infrastructure::adapters::{ConsoleGateway, ConsoleSink};
use ping_bot::infrastructure::config::Config;
use ping_bot::{
    Command, CommandError, CommandRegistry, DispatchOutcome, MessageDispatcher, MessageEvent, OutputSink, SinkError,
};

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Records every send; fails sends whose text matches `fail_on`
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
    fail_on: Option<String>,
}

impl RecordingSink {
    fn failing_on(text: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_on: Some(text.to_string()),
        }
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutputSink for RecordingSink {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        if self.fail_on.as_deref() == Some(text) {
            return Err(SinkError::Network("connection reset".to_string()));
        }
        self.sent.lock().unwrap().push((channel_id.to_string(), text.to_string()));
        Ok(())
    }
}

fn default_dispatcher(sink: Arc<RecordingSink>) -> MessageDispatcher {
    let config = Config::default();
    build_dispatcher(&config, default_registry(&config), sink)
}

#[tokio::test]
async fn test_ping_replies_pong_on_same_channel() {
    ensure_init();
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = default_dispatcher(sink.clone());

    let outcome = dispatcher.on_message(&MessageEvent::new("C1", "U1", "!ping")).await;

    assert_eq!(outcome, DispatchOutcome::Delivered { command: "ping".to_string() });
    assert_eq!(sink.sent(), vec![("C1".to_string(), "Pong!".to_string())]);
}

#[tokio::test]
async fn test_default_dispatcher_repeats_identically() {
    ensure_init();
    let config = Config::default();
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = default_dispatcher(sink.clone());

    let ping = MessageEvent::new("C1", "U1", "!ping");
    let repeats = config.security.rate_limit.max_requests as usize + 5;
    for _ in 0..repeats {
        let outcome = dispatcher.on_message(&ping).await;
        assert_eq!(outcome, DispatchOutcome::Delivered { command: "ping".to_string() });
    }

    let sent = sink.sent();
    assert_eq!(sent.len(), repeats);
    assert!(sent.iter().all(|s| s == &("C1".to_string(), "Pong!".to_string())));
}

#[tokio::test]
async fn test_unmatched_text_sends_nothing() {
    ensure_init();
    let sink = Arc::new(RecordingSink::default());
    let dispatcher = default_dispatcher(sink.clone());

    for text in ["hello", "!pingg", "ping", "!PING", " !ping"] {
        let outcome = dispatcher.on_message(&MessageEvent::new("C1", "U1", text)).await;
        assert_eq!(outcome, DispatchOutcome::NoMatch, "text {:?}", text);
    }
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn test_handler_error_is_contained() {
    ensure_init();
    let sink = Arc::new(RecordingSink::default());

    let mut registry = CommandRegistry::new();
    registry.register(Command::new("boom")
        .when(|e| e.text == "!boom")
        .with_sync_handler(|_| Err(CommandError::ExecutionFailed("backend down".to_string()))));
    registry.register(Command::new("ping")
        .when(|e| e.text == "!ping")
        .reply_with("Pong!"));
    let dispatcher = MessageDispatcher::new(registry, sink.clone());

    let failed = dispatcher.on_message(&MessageEvent::new("C1", "U1", "!boom")).await;
    assert_eq!(failed, DispatchOutcome::HandlerFailed { command: "boom".to_string() });
    assert!(sink.sent().is_empty());

    let next = dispatcher.on_message(&MessageEvent::new("C1", "U1", "!ping")).await;
    assert_eq!(next.command(), Some("ping"));
    assert_eq!(sink.sent().len(), 1);
}

#[tokio::test]
async fn test_sink_failure_does_not_stop_next_event() {
    ensure_init();
    let sink = Arc::new(RecordingSink::failing_on("Pong!"));
    let dispatcher = default_dispatcher(sink.clone());

    let failed = dispatcher.on_message(&MessageEvent::new("C1", "U1", "!ping")).await;
    assert_eq!(failed, DispatchOutcome::SinkFailed { command: "ping".to_string() });

    let echoed = dispatcher.on_message(&MessageEvent::new("C2", "U1", "!echo still here")).await;
    assert_eq!(echoed, DispatchOutcome::Delivered { command: "echo".to_string() });
    assert_eq!(sink.sent(), vec![("C2".to_string(), "still here".to_string())]);
}

#[tokio::test]
async fn test_slow_handler_times_out() {
    ensure_init();
    let sink = Arc::new(RecordingSink::default());

    let mut registry = CommandRegistry::new();
    registry.register(Command::new("slow")
        .when(|e| e.text == "!slow")
        .with_timeout(Duration::from_millis(20))
        .with_handler(|event| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(event.reply("too late")))
        }));
    let dispatcher = MessageDispatcher::new(registry, sink.clone());

    let outcome = dispatcher.on_message(&MessageEvent::new("C1", "U1", "!slow")).await;
    assert_eq!(outcome, DispatchOutcome::HandlerFailed { command: "slow".to_string() });
    assert!(sink.sent().is_empty());
}

#[tokio::test]
async fn test_console_session_end_to_end() {
    ensure_init();
    let config = Config::default();
    let (tx, mut rx) = mpsc::channel(16);
    let sink = Arc::new(ConsoleSink::new().with_sender(tx));
    let dispatcher = build_dispatcher(&config, default_registry(&config), sink);

    let input: &[u8] = b"!ping\nhello\n!echo\n!help ping\n";
    let mut gateway = ConsoleGateway::from_reader(input, "console", "local");

    let stats = runner::run(&mut gateway, &dispatcher, &RunnerOptions::default()).await.unwrap();
    assert_eq!(stats, RunStats { received: 4, delivered: 2, failed: 1 });

    drop(dispatcher);
    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    assert_eq!(lines[0], "[BOT #console] Pong!");
    assert!(lines[1].starts_with("[BOT #console] !ping - "));
    assert_eq!(lines.len(), 2);
}
