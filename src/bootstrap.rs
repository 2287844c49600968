//! Startup wiring shared by the binary and integration tests

use std::sync::Arc;

use crate::application::messaging::{
    IgnoreBotsMiddleware, MessageDispatcher, MiddlewareChain, RateLimitMiddleware, WhitelistMiddleware,
};
use crate::application::services::CommandService;
use crate::domain::entities::CommandRegistry;
use crate::domain::traits::OutputSink;
use crate::infrastructure::config::Config;

/// Default command table for the configured prefix
pub fn default_registry(config: &Config) -> CommandRegistry {
    let mut commands = CommandService::new(&config.bot.prefix, &config.bot.name);
    commands.register_defaults();
    commands.build()
}

/// Dispatcher with the middleware and deadlines `config` asks for
pub fn build_dispatcher(config: &Config, registry: CommandRegistry, sink: Arc<dyn OutputSink>) -> MessageDispatcher {
    let mut chain = MiddlewareChain::new();

    if config.bot.ignore_bots {
        chain = chain.add(IgnoreBotsMiddleware);
    }

    if config.whitelist.enabled {
        tracing::info!("Whitelist enabled for {} users", config.whitelist.users.len());
        chain = chain.add(WhitelistMiddleware::new(config.whitelist.users.iter().cloned()));
    }

    let rate_limit = &config.security.rate_limit;
    if rate_limit.enabled {
        chain = chain.add(RateLimitMiddleware::new(rate_limit.max_requests, rate_limit.window_seconds));
    }

    MessageDispatcher::new(registry, sink)
        .with_middlewares(chain.build())
        .with_default_timeout(config.handler_timeout())
}
