//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: Default command set and help rendering
//! - Errors: Domain-specific errors
//! - Messaging: Parsing, predicates, middleware, dispatching
//! - Runner: The event loop wiring a gateway to the dispatcher

pub mod errors;
pub mod messaging;
pub mod runner;
pub mod services;
