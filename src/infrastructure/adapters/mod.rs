//! Platform adapters - gateways and sinks for chat platforms

pub mod console;
pub mod retry;
pub mod telegram;

pub use console::{ConsoleGateway, ConsoleSink};
pub use retry::{RetryPolicy, RetryingSink};
pub use telegram::{TelegramClient, TelegramGateway};
