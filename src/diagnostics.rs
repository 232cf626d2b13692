use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Time-windowed deduplication of diagnostic events.
#[derive(Debug)]
pub struct EventThrottle {
    ttl: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl EventThrottle {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    /// True when `key` was not emitted within the last `ttl`.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        seen.retain(|_, at| now.saturating_duration_since(*at) < self.ttl);

        if seen.contains_key(key) {
            return false;
        }
        seen.insert(key.to_string(), now);
        true
    }
}

/// Logs failures once per throttle window per (context, message).
#[derive(Debug)]
pub struct ErrorReporter {
    throttle: EventThrottle,
}

impl ErrorReporter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            throttle: EventThrottle::new(ttl),
        }
    }

    /// Returns whether the event was emitted.
    pub fn report(&self, context: &str, err: &dyn Display) -> bool {
        let message = err.to_string();
        let key = format!("{context}:{message}");

        if self.throttle.allow(&key) {
            tracing::error!(context, error = %message, "operation failed");
            true
        } else {
            tracing::debug!(context, "suppressed repeated error");
            false
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
