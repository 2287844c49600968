//! Message dispatcher - Routes message events to command handlers

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use super::middleware::{Middleware, MiddlewareError, Next};
use super::observer::{DispatchObserver, TracingObserver};
use crate::application::errors::{CommandError, SinkError};
use crate::domain::entities::command::panic_message;
use crate::domain::entities::{Command, CommandRegistry, HandlerResult, MessageEvent};
use crate::domain::traits::OutputSink;

/// What happened to a single inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Stopped by middleware before matching
    Filtered,
    /// No command predicate matched
    NoMatch,
    /// Handler ran and chose not to reply
    NoReply { command: String },
    /// Reply handed to the sink successfully
    Delivered { command: String },
    /// Handler returned an error, panicked or timed out
    HandlerFailed { command: String },
    /// Sink could not deliver the reply
    SinkFailed { command: String },
}

impl DispatchOutcome {
    /// Name of the matched command, if any
    pub fn command(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Filtered | DispatchOutcome::NoMatch => None,
            DispatchOutcome::NoReply { command }
            | DispatchOutcome::Delivered { command }
            | DispatchOutcome::HandlerFailed { command }
            | DispatchOutcome::SinkFailed { command } => Some(command.as_str()),
        }
    }
}

/// Message dispatcher - runs middleware, matches the registry, invokes at
/// most one handler and forwards its reply to the sink.
///
/// The registry is frozen once the dispatcher is built.
pub struct MessageDispatcher {
    registry: Arc<CommandRegistry>,
    sink: Arc<dyn OutputSink>,
    middleware: Vec<Arc<dyn Middleware>>,
    observer: Arc<dyn DispatchObserver>,
    default_timeout: Option<Duration>,
}

impl MessageDispatcher {
    pub fn new(registry: CommandRegistry, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            registry: Arc::new(registry),
            sink,
            middleware: Vec::new(),
            observer: Arc::new(TracingObserver),
            default_timeout: None,
        }
    }

    /// Add middleware to the chain
    pub fn with_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Append a prebuilt middleware chain
    pub fn with_middlewares(mut self, middlewares: Vec<Arc<dyn Middleware>>) -> Self {
        self.middleware.extend(middlewares);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn DispatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Deadline applied to handlers that do not set their own
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Dispatch one event. Never fails: every error is reported to the
    /// observer and reflected in the outcome.
    pub async fn on_message(&self, event: &MessageEvent) -> DispatchOutcome {
        let filtered = catch_unwind(AssertUnwindSafe(|| Next::new(&self.middleware).run(event)))
            .unwrap_or_else(|payload| {
                Err(MiddlewareError::Internal(format!("middleware panicked: {}", panic_message(payload.as_ref()))))
            });
        if let Err(e) = filtered {
            self.observer.on_filtered(event, &e);
            return DispatchOutcome::Filtered;
        }

        let observer = &self.observer;
        let matched = self.registry.find_with(event, |cmd, err| {
            observer.on_predicate_error(event, &cmd.name, err);
        });

        let Some(command) = matched else {
            tracing::trace!("[{}] No command for: {}", event.channel_id, event.preview());
            return DispatchOutcome::NoMatch;
        };

        let name = command.name.clone();
        tracing::debug!("[{}] {} -> {}", event.channel_id, event.preview(), name);

        let reply = match self.run_handler(command, event).await {
            Ok(Some(reply)) => reply,
            Ok(None) => return DispatchOutcome::NoReply { command: name },
            Err(e) => {
                self.observer.on_handler_error(event, &name, &e);
                return DispatchOutcome::HandlerFailed { command: name };
            }
        };

        let sent = AssertUnwindSafe(self.sink.send(&reply.channel_id, &reply.text))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(SinkError::Rejected(format!("sink panicked: {}", panic_message(payload.as_ref()))))
            });

        match sent {
            Ok(()) => {
                tracing::info!("[{}] Replied to {} via {}", reply.channel_id, event.id, name);
                DispatchOutcome::Delivered { command: name }
            }
            Err(e) => {
                self.observer.on_sink_error(event, &name, &e);
                DispatchOutcome::SinkFailed { command: name }
            }
        }
    }

    /// Run the handler with panic isolation and the effective deadline
    async fn run_handler(&self, command: &Command, event: &MessageEvent) -> HandlerResult {
        let future = match catch_unwind(AssertUnwindSafe(|| command.invoke(event.clone()))) {
            Ok(future) => future,
            Err(payload) => return Err(CommandError::Panicked(panic_message(payload.as_ref()))),
        };

        let guarded = AssertUnwindSafe(future).catch_unwind();

        let outcome = match command.timeout.or(self.default_timeout) {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(CommandError::TimedOut(limit)),
            },
            None => guarded.await,
        };

        outcome.unwrap_or_else(|payload| Err(CommandError::Panicked(panic_message(payload.as_ref()))))
    }
}
