//! Domain entities - Core business objects with no external dependencies

pub mod command;
pub mod message;
pub mod reply;

pub use command::{Command, CommandHandler, CommandRegistry, HandlerFuture, HandlerResult, Predicate};
pub use message::MessageEvent;
pub use reply::ReplyIntent;
