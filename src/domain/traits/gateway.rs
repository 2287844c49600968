use async_trait::async_trait;

use crate::application::errors::BotError;
use crate::domain::entities::MessageEvent;

/// Gateway - the chat client's inbound event stream
///
/// Events are yielded one at a time. Connection handling, reconnects and
/// credentials belong to the implementation.
#[async_trait]
pub trait Gateway: Send {
    /// Human readable name for log lines
    fn name(&self) -> &str;

    /// Wait for the next message event. `Ok(None)` means the stream ended.
    async fn next_event(&mut self) -> Result<Option<MessageEvent>, BotError>;
}
