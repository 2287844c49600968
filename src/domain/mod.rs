//! Domain layer - Core types the dispatch shell is built from
//! 
//! This layer contains:
//! - Entities: MessageEvent, ReplyIntent, Command and its registry
//! - Traits: Abstractions for the chat client (Gateway, OutputSink)

pub mod entities;
pub mod traits;
