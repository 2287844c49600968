//! Domain traits - Abstractions for infrastructure implementations

pub mod gateway;
pub mod sink;

pub use gateway::Gateway;
pub use sink::OutputSink;
