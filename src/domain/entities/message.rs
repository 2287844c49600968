use chrono::{DateTime, Utc};

use super::ReplyIntent;

/// Immutable snapshot of one inbound chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub id: String,
    pub text: String,
    pub channel_id: String,
    pub author_id: String,
    pub author_is_bot: bool,
    pub timestamp: DateTime<Utc>,
    pub platform: String,
}

impl MessageEvent {
    pub fn new(
        channel_id: impl Into<String>,
        author_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            channel_id: channel_id.into(),
            author_id: author_id.into(),
            author_is_bot: false,
            timestamp: Utc::now(),
            platform: "unknown".to_string(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn from_bot(mut self, is_bot: bool) -> Self {
        self.author_is_bot = is_bot;
        self
    }

    /// Reply addressed to the channel this message came from
    pub fn reply(&self, text: impl Into<String>) -> ReplyIntent {
        ReplyIntent::new(self.channel_id.clone(), text)
    }

    /// Short preview for log lines
    pub fn preview(&self) -> String {
        self.text.chars().take(50).collect()
    }
}
