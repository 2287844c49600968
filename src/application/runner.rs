//! Event loop - the single place a gateway is wired to the dispatcher

use std::time::Duration;

use crate::application::errors::BotError;
use crate::application::messaging::{DispatchOutcome, MessageDispatcher};
use crate::domain::traits::Gateway;

/// Event loop tuning
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Pause after a gateway error before polling again
    pub reconnect_delay: Duration,
    /// Give up after this many gateway errors in a row (0 = never)
    pub max_consecutive_errors: u32,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            max_consecutive_errors: 0,
        }
    }
}

/// Counters reported when the loop ends
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub received: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// Pull events from `gateway` one at a time and dispatch each before the next.
///
/// Returns when the gateway reports end of stream, or with the last error
/// once `max_consecutive_errors` is reached.
pub async fn run<G: Gateway + ?Sized>(
    gateway: &mut G,
    dispatcher: &MessageDispatcher,
    options: &RunnerOptions,
) -> Result<RunStats, BotError> {
    let mut stats = RunStats::default();
    let mut consecutive_errors = 0u32;

    tracing::info!("Starting message loop on {} ({} commands)", gateway.name(), dispatcher.registry().len());

    loop {
        let event = match gateway.next_event().await {
            Ok(Some(event)) => {
                consecutive_errors = 0;
                event
            }
            Ok(None) => {
                tracing::info!("{} closed the event stream", gateway.name());
                return Ok(stats);
            }
            Err(e) => {
                consecutive_errors += 1;
                tracing::error!("Failed to get events from {}: {}", gateway.name(), e);
                if options.max_consecutive_errors > 0 && consecutive_errors >= options.max_consecutive_errors {
                    return Err(e);
                }
                tokio::time::sleep(options.reconnect_delay).await;
                continue;
            }
        };

        stats.received += 1;
        match dispatcher.on_message(&event).await {
            DispatchOutcome::Delivered { .. } => stats.delivered += 1,
            DispatchOutcome::HandlerFailed { .. } | DispatchOutcome::SinkFailed { .. } => stats.failed += 1,
            _ => {}
        }
    }
}
