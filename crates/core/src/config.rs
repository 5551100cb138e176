//! Configuration for the WebWatch client and the route sync engine.

use std::time::Duration;

use bus_watch_transit::RouteId;

/// Default WebWatch deployment (LAVTA Wheels).
pub const DEFAULT_BASE_URL: &str = "http://webwatch.lavta.org/TMWebWatch";

/// Default HTTP timeout for a single upstream request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default vehicle refresh cadence.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 7;

/// Route shown when nothing has been saved yet.
pub const DEFAULT_ROUTE: RouteId = RouteId::new(10);

/// Capacity of the engine event channel. Slow subscribers lag past this.
pub const DEFAULT_EVENT_CAPACITY: usize = 16;

/// Configuration for [`crate::client::WebWatchClient`].
#[derive(Debug, Clone)]
pub struct WebWatchConfig {
    /// Base URL, without the `.aspx` page segment.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl WebWatchConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for WebWatchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Bounded exponential backoff for one-shot fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero behaves like one.
    pub max_attempts: u32,

    /// Delay before the first retry; doubled for each retry after that.
    pub base_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A single attempt, never retried.
    pub const NEVER: RetryPolicy = RetryPolicy {
        max_attempts: 1,
        base_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Configuration for [`crate::sync::RouteSyncEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between vehicle refresh ticks.
    pub refresh_interval: Duration,

    /// Route activated by `start()` when the store has nothing saved.
    pub default_route: RouteId,

    /// Retry policy for the route list, stops and trace fetches.
    pub retry: RetryPolicy,

    /// Buffer size of the event broadcast channel.
    pub event_capacity: usize,
}

impl EngineConfig {
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_default_route(mut self, route: RouteId) -> Self {
        self.default_route = route;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            default_route: DEFAULT_ROUTE,
            retry: RetryPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}
