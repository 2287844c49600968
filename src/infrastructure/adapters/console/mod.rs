//! Console adapter for development/testing

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::mpsc;

use crate::application::errors::{BotError, SinkError};
use crate::domain::entities::MessageEvent;
use crate::domain::traits::{Gateway, OutputSink};

/// Reads one message event per input line
pub struct ConsoleGateway<R = BufReader<Stdin>> {
    reader: R,
    channel_id: String,
    user_id: String,
}

impl ConsoleGateway {
    pub fn stdin(channel_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()), channel_id, user_id)
    }
}

impl<R> ConsoleGateway<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn from_reader(reader: R, channel_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            reader,
            channel_id: channel_id.into(),
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl<R> Gateway for ConsoleGateway<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn name(&self) -> &str {
        "console"
    }

    async fn next_event(&mut self) -> Result<Option<MessageEvent>, BotError> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self.reader.read_line(&mut line).await
                .map_err(|e| BotError::Network(format!("stdin: {}", e)))?;
            if read == 0 {
                return Ok(None);
            }

            let text = line.trim_end_matches(&['\r', '\n'][..]);
            if text.trim().is_empty() {
                continue;
            }

            return Ok(Some(
                MessageEvent::new(&self.channel_id, &self.user_id, text).with_platform("console"),
            ));
        }
    }
}

/// Prints replies to stdout, or forwards them to a channel when one is set
#[derive(Default)]
pub struct ConsoleSink {
    sender: Option<mpsc::Sender<String>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sender(mut self, sender: mpsc::Sender<String>) -> Self {
        self.sender = Some(sender);
        self
    }
}

#[async_trait]
impl OutputSink for ConsoleSink {
    async fn send(&self, channel_id: &str, text: &str) -> Result<(), SinkError> {
        let line = format!("[BOT #{}] {}", channel_id, text);
        match &self.sender {
            Some(sender) => sender.send(line).await.map_err(|_| SinkError::Closed),
            None => {
                println!("{}", line);
                Ok(())
            }
        }
    }
}
