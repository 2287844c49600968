//! ping-bot - a small command dispatch shell for chat bots
//!
//! Inbound [`MessageEvent`]s from a [`Gateway`] are matched against an
//! ordered [`CommandRegistry`]; the first matching command's handler runs
//! and its [`ReplyIntent`] goes to an [`OutputSink`].

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;

pub use application::errors::{BotError, CommandError, ConfigError, PredicateError, SinkError};
pub use application::messaging::{DispatchOutcome, MessageDispatcher};
pub use domain::entities::{Command, CommandRegistry, MessageEvent, ReplyIntent};
pub use domain::traits::{Gateway, OutputSink};
