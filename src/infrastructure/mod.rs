//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Adapters: Platform integrations (console, Telegram) and sink decorators

pub mod adapters;
pub mod config;
