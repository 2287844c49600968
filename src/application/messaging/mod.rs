//! Message handling - Event-driven command dispatch

pub mod dispatcher;
pub mod middleware;
pub mod observer;
pub mod parser;
pub mod predicates;

pub use dispatcher::{DispatchOutcome, MessageDispatcher};
pub use middleware::{
    IgnoreBotsMiddleware, Middleware, MiddlewareChain, MiddlewareError, RateLimitMiddleware,
    WhitelistMiddleware,
};
pub use observer::{DispatchObserver, TracingObserver};
pub use parser::{MessageParser, ParsedCommand};
