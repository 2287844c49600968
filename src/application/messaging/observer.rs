//! Observability hook for failures contained by the dispatcher

use crate::application::errors::{CommandError, PredicateError, SinkError};
use crate::domain::entities::MessageEvent;

use super::middleware::MiddlewareError;

/// Receives every failure the dispatcher swallows.
///
/// All methods default to no-ops so hosts only override what they wire up.
pub trait DispatchObserver: Send + Sync {
    fn on_filtered(&self, _event: &MessageEvent, _error: &MiddlewareError) {}

    fn on_predicate_error(&self, _event: &MessageEvent, _command: &str, _error: &PredicateError) {}

    fn on_handler_error(&self, _event: &MessageEvent, _command: &str, _error: &CommandError) {}

    fn on_sink_error(&self, _event: &MessageEvent, _command: &str, _error: &SinkError) {}
}

/// Default observer: reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DispatchObserver for TracingObserver {
    fn on_filtered(&self, event: &MessageEvent, error: &MiddlewareError) {
        tracing::debug!("[{}] Filtered message {}: {}", event.channel_id, event.id, error);
    }

    fn on_predicate_error(&self, event: &MessageEvent, command: &str, error: &PredicateError) {
        tracing::warn!("[{}] Predicate for {} failed: {}", event.channel_id, command, error);
    }

    fn on_handler_error(&self, event: &MessageEvent, command: &str, error: &CommandError) {
        tracing::error!("[{}] Command {} failed: {}", event.channel_id, command, error);
    }

    fn on_sink_error(&self, event: &MessageEvent, command: &str, error: &SinkError) {
        tracing::error!("[{}] Failed to send reply for {}: {}", event.channel_id, command, error);
    }
}
