//! Telegram adapter

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::application::errors::{BotError, SinkError};
use crate::domain::entities::MessageEvent;
use crate::domain::traits::{Gateway, OutputSink};

/// Telegram API base URL
const API_BASE: &str = "https://api.telegram.org";

/// Telegram update type
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub date: i64,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: i64,
}

/// Envelope around every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Bot identity returned by getMe
#[derive(Debug, Clone, Deserialize)]
pub struct BotInfo {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

/// Thin Bot API client; also the outbound sink
pub struct TelegramClient {
    token: String,
    client: Client,
    api_base: String,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            client: Client::new(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Point at a different Bot API server
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Get the API URL for a method
    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Duration) -> Result<T, BotError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // The URL carries the token, so it is stripped from errors
        let response = self.client
            .post(self.api_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| BotError::Network(e.without_url().to_string()))?;

        let status = response.status();
        let data: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| BotError::Parse(e.without_url().to_string()))?;

        match data.result {
            Some(result) if data.ok => Ok(result),
            _ => Err(BotError::Network(format!(
                "Telegram API error {} on {}: {}",
                status,
                method,
                data.description.unwrap_or_default()
            ))),
        }
    }

    /// Fetch bot info from Telegram API
    pub async fn get_me(&self) -> Result<BotInfo, BotError> {
        self.call("getMe", &serde_json::json!({}), Duration::from_secs(10)).await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, BotError> {
        #[derive(Serialize)]
        struct GetUpdatesRequest<'a> {
            offset: i64,
            timeout: u64,
            allowed_updates: &'a [&'a str],
        }

        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };

        // Leave headroom over the server-side poll timeout
        let http_timeout = Duration::from_secs(timeout_secs + 10);
        self.call("getUpdates", &request, http_timeout).await
    }
}

#[async_trait]
impl OutputSink for TelegramClient {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        #[derive(Serialize)]
        struct SendMessageRequest<'a> {
            chat_id: &'a str,
            text: &'a str,
        }

        tracing::debug!("Sending to {}: {} chars", channel_id, text.chars().count());

        let request = SendMessageRequest { chat_id: channel_id, text };
        let response = self.client
            .post(self.api_url("sendMessage"))
            .timeout(Duration::from_secs(30))
            .json(&request)
            .send()
            .await
            .map_err(|e| SinkError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body: Option<ApiResponse<serde_json::Value>> = response.json().await.ok();
        Err(classify_failure(status.as_u16(), body))
    }
}

/// Map a failed sendMessage response onto the sink error taxonomy
fn classify_failure(status: u16, body: Option<ApiResponse<serde_json::Value>>) -> SinkError {
    let description = body.as_ref()
        .and_then(|b| b.description.clone())
        .unwrap_or_else(|| format!("HTTP {}", status));

    match status {
        429 => {
            let retry_after = body
                .and_then(|b| b.parameters)
                .and_then(|p| p.retry_after)
                .unwrap_or(1);
            SinkError::RateLimited { retry_after: Duration::from_secs(retry_after) }
        }
        400..=499 => SinkError::Rejected(description),
        _ => SinkError::Network(description),
    }
}

/// Turn a text message update into an event; other updates are skipped
pub fn update_to_event(update: &Update) -> Option<MessageEvent> {
    let message = update.message.as_ref()?;
    let text = message.text.as_ref()?;

    let (author_id, is_bot) = message.from.as_ref()
        .map(|u| (u.id.to_string(), u.is_bot))
        .unwrap_or_default();

    let timestamp = DateTime::<Utc>::from_timestamp(message.date, 0).unwrap_or_else(Utc::now);

    Some(
        MessageEvent::new(message.chat.id.to_string(), author_id, text.clone())
            .with_id(format!("{}:{}", message.chat.id, message.message_id))
            .with_platform("telegram")
            .with_timestamp(timestamp)
            .from_bot(is_bot),
    )
}

/// Long-polling event source
pub struct TelegramGateway {
    client: Arc<TelegramClient>,
    offset: i64,
    poll_timeout_secs: u64,
    pending: VecDeque<MessageEvent>,
}

impl TelegramGateway {
    pub fn new(client: Arc<TelegramClient>, poll_timeout_secs: u64) -> Self {
        Self {
            client,
            offset: 0,
            poll_timeout_secs,
            pending: VecDeque::new(),
        }
    }

    /// Get the next update offset
    pub fn next_offset(current: i64, updates: &[Update]) -> i64 {
        updates.iter()
            .map(|u| u.update_id + 1)
            .max()
            .map_or(current, |next| next.max(current))
    }
}

#[async_trait]
impl Gateway for TelegramGateway {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn next_event(&mut self) -> Result<Option<MessageEvent>, BotError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let updates = self.client.get_updates(self.offset, self.poll_timeout_secs).await?;
            if !updates.is_empty() {
                tracing::debug!("Received {} updates", updates.len());
            }

            self.offset = Self::next_offset(self.offset, &updates);
            self.pending.extend(updates.iter().filter_map(update_to_event));
        }
    }
}
