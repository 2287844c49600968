use std::sync::Arc;

use async_trait::async_trait;

use crate::application::errors::SinkError;

/// Output sink - delivers text to a channel on the chat platform
///
/// Implementations own retry and rate-limit policy; the dispatcher calls
/// `send` at most once per inbound event and only reports failures.
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Send `text` to `channel_id`
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError>;
}

#[async_trait]
impl<S: OutputSink + ?Sized> OutputSink for Arc<S> {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        (**self).send(channel_id, text).await
    }
}
