use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};

use crate::application::errors::{CommandError, PredicateError};
use crate::domain::entities::{MessageEvent, ReplyIntent};

/// What a handler produces: a reply, nothing, or a failure
pub type HandlerResult = Result<Option<ReplyIntent>, CommandError>;

/// Boxed future returned by every command handler
pub type HandlerFuture = BoxFuture<'static, HandlerResult>;

/// Command handler function type
pub type CommandHandler = Box<dyn Fn(MessageEvent) -> HandlerFuture + Send + Sync>;

/// Command predicate function type
pub type Predicate = Box<dyn Fn(&MessageEvent) -> Result<bool, PredicateError> + Send + Sync>;

/// Represents a bot command
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub usage: Option<String>,
    pub timeout: Option<Duration>,
    predicate: Option<Predicate>,
    handler: Option<CommandHandler>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            usage: None,
            timeout: None,
            predicate: None,
            handler: None,
        }
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    /// Deadline for the handler; overrides the dispatcher default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Match with an infallible predicate
    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(&MessageEvent) -> bool + Send + Sync + 'static,
    {
        self.with_predicate(Box::new(move |event: &MessageEvent| -> Result<bool, PredicateError> {
            Ok(predicate(event))
        }))
    }

    /// Match with a predicate that may report an error
    pub fn when_fallible<F>(self, predicate: F) -> Self
    where
        F: Fn(&MessageEvent) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        self.with_predicate(Box::new(predicate))
    }

    pub fn with_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(MessageEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handler = Some(Box::new(move |event: MessageEvent| handler(event).boxed()));
        self
    }

    pub fn with_sync_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&MessageEvent) -> HandlerResult + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(move |event: MessageEvent| future::ready(handler(&event)).boxed()));
        self
    }

    /// Reply with fixed text in the originating channel
    pub fn reply_with(self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.with_sync_handler(move |event| Ok(Some(event.reply(text.clone()))))
    }

    /// Evaluate the predicate; panics are caught and reported as errors.
    /// A command without a predicate never matches.
    pub fn matches(&self, event: &MessageEvent) -> Result<bool, PredicateError> {
        let Some(predicate) = &self.predicate else {
            return Ok(false);
        };

        catch_unwind(AssertUnwindSafe(|| predicate(event)))
            .unwrap_or_else(|payload| Err(PredicateError::Panicked(panic_message(payload.as_ref()))))
    }

    /// Start the handler for an event. The returned future is not yet polled.
    pub fn invoke(&self, event: MessageEvent) -> HandlerFuture {
        match &self.handler {
            Some(handler) => handler(event),
            None => {
                let err = CommandError::ExecutionFailed(format!("Command {} has no handler", self.name));
                future::ready(Err(err)).boxed()
            }
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Render a panic payload as text
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Ordered command table. First registered match wins.
#[derive(Default, Debug)]
pub struct CommandRegistry {
    commands: Vec<Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command; duplicates shadow nothing, they are simply unreachable
    pub fn register(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// First command matching `event`, logging predicate failures
    pub fn find(&self, event: &MessageEvent) -> Option<&Command> {
        self.find_with(event, |cmd, err| {
            tracing::warn!("[{}] predicate for {} failed: {}", event.channel_id, cmd.name, err);
        })
    }

    /// First command matching `event`. A failing predicate counts as no match
    /// and is passed to `on_error` before scanning continues.
    pub fn find_with<F>(&self, event: &MessageEvent, mut on_error: F) -> Option<&Command>
    where
        F: FnMut(&Command, &PredicateError),
    {
        self.commands.iter().find(|cmd| match cmd.matches(event) {
            Ok(matched) => matched,
            Err(e) => {
                on_error(cmd, &e);
                false
            }
        })
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn all(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn text_is(expected: &'static str) -> impl Fn(&MessageEvent) -> bool + Send + Sync {
        move |e| e.text == expected
    }

    fn event(text: &str) -> MessageEvent {
        MessageEvent::new("C1", "U1", text)
    }

    #[test]
    fn test_find_returns_first_match_in_order() {
        let mut registry = CommandRegistry::new();
        registry.register(Command::new("other").when(text_is("!y")));
        registry.register(Command::new("a").when(text_is("!x")));
        registry.register(Command::new("b").when(text_is("!x")));

        let found = registry.find(&event("!x")).map(|c| c.name.as_str());
        assert_eq!(found, Some("a"));
    }

    #[test]
    fn test_find_no_match() {
        let mut registry = CommandRegistry::new();
        registry.register(Command::new("ping").when(text_is("!ping")));
        assert!(registry.find(&event("!pong")).is_none());
        assert!(CommandRegistry::new().find(&event("!ping")).is_none());
    }

    #[test]
    fn test_find_short_circuits() {
        let later_calls = Arc::new(AtomicUsize::new(0));
        let counter = later_calls.clone();

        let mut registry = CommandRegistry::new();
        registry.register(Command::new("first").when(|_| true));
        registry.register(Command::new("second").when(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        }));

        registry.find(&event("anything"));
        assert_eq!(later_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failing_predicate_is_skipped() {
        let mut registry = CommandRegistry::new();
        registry.register(
            Command::new("broken").when_fallible(|_| Err(PredicateError::Failed("bad state".into()))),
        );
        registry.register(Command::new("fallback").when(|_| true));

        let mut failures = Vec::new();
        let found = registry.find_with(&event("!x"), |cmd, err| {
            failures.push((cmd.name.clone(), err.clone()));
        });

        assert_eq!(found.map(|c| c.name.as_str()), Some("fallback"));
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "broken");
    }

    #[test]
    fn test_panicking_predicate_fails_closed() {
        let cmd = Command::new("panics").when(|_| panic!("predicate exploded"));
        let result = cmd.matches(&event("!x"));
        assert_eq!(result, Err(PredicateError::Panicked("predicate exploded".to_string())));
    }

    #[test]
    fn test_command_without_predicate_never_matches() {
        let cmd = Command::new("idle").reply_with("unused");
        assert_eq!(cmd.matches(&event("idle")), Ok(false));
    }

    #[tokio::test]
    async fn test_reply_with_targets_event_channel() {
        let cmd = Command::new("ping").when(text_is("!ping")).reply_with("Pong!");
        let reply = cmd.invoke(event("!ping")).await.unwrap();
        assert_eq!(reply, Some(ReplyIntent::new("C1", "Pong!")));
    }

    #[tokio::test]
    async fn test_invoke_without_handler_fails() {
        let cmd = Command::new("empty").when(|_| true);
        let result = cmd.invoke(event("x")).await;
        assert!(matches!(result, Err(CommandError::ExecutionFailed(_))));
    }

    #[test]
    fn test_get_by_name_case_insensitive() {
        let mut registry = CommandRegistry::new();
        registry.register(Command::new("Ping").with_description("Check bot is alive"));
        assert!(registry.get("ping").is_some());
        assert!(registry.get("pong").is_none());
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }
}
