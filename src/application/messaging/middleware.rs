//! Middleware system - filters that run before command matching

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::domain::entities::MessageEvent;

/// Middleware trait - filters that may stop an event before dispatch
pub trait Middleware: Send + Sync {
    /// Inspect the event and either block it or hand it to `next`
    fn process(&self, event: &MessageEvent, next: Next<'_>) -> MiddlewareResult;
}

/// Result of middleware processing
pub type MiddlewareResult = Result<(), MiddlewareError>;

/// Middleware errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareError {
    /// Stop processing
    Blocked(String),
    /// Rate limited
    RateLimited { retry_after: Duration },
    /// Permission denied
    PermissionDenied(String),
    /// Internal error
    Internal(String),
}

impl std::fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareError::Blocked(msg) => write!(f, "Blocked: {}", msg),
            MiddlewareError::RateLimited { retry_after } => {
                write!(f, "Rate limited, retry after {:?}", retry_after)
            }
            MiddlewareError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            MiddlewareError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for MiddlewareError {}

/// Next middleware in chain
#[derive(Clone, Copy)]
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub fn new(middlewares: &'a [Arc<dyn Middleware>]) -> Self {
        Self { remaining: middlewares }
    }

    /// Process remaining middleware
    pub fn run(self, event: &MessageEvent) -> MiddlewareResult {
        match self.remaining.split_first() {
            Some((first, rest)) => first.process(event, Next::new(rest)),
            // No more middleware, event may be dispatched
            None => Ok(()),
        }
    }
}

/// Middleware chain builder
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn build(self) -> Vec<Arc<dyn Middleware>> {
        self.middlewares
    }
}

impl Default for MiddlewareChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Drops messages written by bots, including this one
pub struct IgnoreBotsMiddleware;

impl Middleware for IgnoreBotsMiddleware {
    fn process(&self, event: &MessageEvent, next: Next<'_>) -> MiddlewareResult {
        if event.author_is_bot {
            return Err(MiddlewareError::Blocked(format!("author {} is a bot", event.author_id)));
        }
        next.run(event)
    }
}

/// Only lets listed authors through
pub struct WhitelistMiddleware {
    allowed: HashSet<String>,
}

impl WhitelistMiddleware {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: users.into_iter().map(Into::into).collect(),
        }
    }
}

impl Middleware for WhitelistMiddleware {
    fn process(&self, event: &MessageEvent, next: Next<'_>) -> MiddlewareResult {
        if !self.allowed.contains(&event.author_id) {
            return Err(MiddlewareError::PermissionDenied(format!(
                "user {} not in whitelist",
                event.author_id
            )));
        }
        next.run(event)
    }
}

/// Rate limit middleware
pub struct RateLimitMiddleware {
    requests: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimitMiddleware {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self::with_window(max_requests, Duration::from_secs(window_secs))
    }

    pub fn with_window(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    fn check_rate_limit(&self, key: &str) -> MiddlewareResult {
        let mut requests = self.requests.lock()
            .map_err(|_| MiddlewareError::Internal("Lock poisoned".to_string()))?;

        let now = Instant::now();

        // Drop requests outside the window, and authors with none left
        requests.retain(|_, times| {
            times.retain(|&t| now.duration_since(t) < self.window);
            !times.is_empty()
        });

        let times = requests.entry(key.to_string()).or_default();

        if times.len() >= self.max_requests as usize {
            let retry_after = times.first()
                .map(|t| self.window.saturating_sub(now.duration_since(*t)))
                .unwrap_or(self.window);

            return Err(MiddlewareError::RateLimited { retry_after });
        }

        times.push(now);
        Ok(())
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Middleware for RateLimitMiddleware {
    fn process(&self, event: &MessageEvent, next: Next<'_>) -> MiddlewareResult {
        // Rate limit by author, or by channel when the platform gives no author
        let key = if event.author_id.is_empty() {
            &event.channel_id
        } else {
            &event.author_id
        };

        self.check_rate_limit(key)?;

        next.run(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl Middleware for Counting {
        fn process(&self, event: &MessageEvent, next: Next<'_>) -> MiddlewareResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            next.run(event)
        }
    }

    fn run_chain(chain: &[Arc<dyn Middleware>], event: &MessageEvent) -> MiddlewareResult {
        Next::new(chain).run(event)
    }

    #[test]
    fn test_empty_chain_passes() {
        let event = MessageEvent::new("C1", "U1", "!ping");
        assert_eq!(run_chain(&[], &event), Ok(()));
    }

    #[test]
    fn test_blocking_middleware_stops_chain() {
        let seen = Arc::new(AtomicUsize::new(0));
        let chain = MiddlewareChain::new()
            .add(IgnoreBotsMiddleware)
            .add(Counting(seen.clone()))
            .build();

        let bot_event = MessageEvent::new("C1", "B1", "!ping").from_bot(true);
        assert!(matches!(run_chain(&chain, &bot_event), Err(MiddlewareError::Blocked(_))));
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        let user_event = MessageEvent::new("C1", "U1", "!ping");
        assert_eq!(run_chain(&chain, &user_event), Ok(()));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_whitelist() {
        let chain = MiddlewareChain::new()
            .add(WhitelistMiddleware::new(["U1"]))
            .build();

        assert_eq!(run_chain(&chain, &MessageEvent::new("C1", "U1", "hi")), Ok(()));
        assert!(matches!(
            run_chain(&chain, &MessageEvent::new("C1", "U2", "hi")),
            Err(MiddlewareError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_rate_limit_per_author() {
        let chain = MiddlewareChain::new()
            .add(RateLimitMiddleware::new(2, 60))
            .build();

        let event = MessageEvent::new("C1", "U1", "!ping");
        assert_eq!(run_chain(&chain, &event), Ok(()));
        assert_eq!(run_chain(&chain, &event), Ok(()));
        match run_chain(&chain, &event) {
            Err(MiddlewareError::RateLimited { retry_after }) => {
                assert!(retry_after <= Duration::from_secs(60));
            }
            other => panic!("expected rate limit, got {:?}", other),
        }

        // Other authors have their own window
        let other = MessageEvent::new("C1", "U2", "!ping");
        assert_eq!(run_chain(&chain, &other), Ok(()));

        // No author: the channel is the key
        let anonymous = MessageEvent::new("C9", "", "!ping");
        assert_eq!(run_chain(&chain, &anonymous), Ok(()));
        assert_eq!(run_chain(&chain, &anonymous), Ok(()));
        assert!(matches!(run_chain(&chain, &anonymous), Err(MiddlewareError::RateLimited { .. })));
        assert_eq!(run_chain(&chain, &MessageEvent::new("C8", "", "!ping")), Ok(()));
    }

    #[test]
    fn test_rate_limit_window_expires() {
        let limiter = RateLimitMiddleware::with_window(1, Duration::from_millis(20));
        assert!(limiter.check_rate_limit("U1").is_ok());
        assert!(limiter.check_rate_limit("U1").is_err());
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check_rate_limit("U1").is_ok());
    }

    #[test]
    fn test_rate_limit_forgets_idle_authors() {
        let limiter = RateLimitMiddleware::with_window(5, Duration::from_millis(5));
        for i in 0..100 {
            assert!(limiter.check_rate_limit(&format!("U{}", i)).is_ok());
        }
        assert_eq!(limiter.tracked_keys(), 100);

        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.check_rate_limit("U0").is_ok());
        assert_eq!(limiter.tracked_keys(), 1);
    }
}
