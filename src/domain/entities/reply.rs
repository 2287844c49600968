/// Outbound text a handler wants delivered to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyIntent {
    pub channel_id: String,
    pub text: String,
}

impl ReplyIntent {
    pub fn new(channel_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            text: text.into(),
        }
    }
}
