use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::llm::ChatError;
use crate::session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Fixed-window hit counter keyed by identity.
pub trait RateLimitStore: Send + Sync {
    fn hit(&self, key: &str, limit: u32, window: Duration, now: Instant) -> Decision;

    /// Drops entries whose window has fully elapsed. Returns how many were removed.
    fn purge_expired(&self, window: Duration, now: Instant) -> usize;
}

#[derive(Debug)]
struct Window {
    count: u32,
    started: Instant,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RateLimitStore for MemoryStore {
    fn hit(&self, key: &str, limit: u32, window: Duration, now: Instant) -> Decision {
        let mut map = match self.windows.lock() {
            Ok(m) => m,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = map.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        if now.saturating_duration_since(entry.started) >= window {
            entry.count = 0;
            entry.started = now;
        }
        if entry.count >= limit {
            let retry_after = window.saturating_sub(now.saturating_duration_since(entry.started));
            return Decision::Limited { retry_after };
        }
        entry.count += 1;
        Decision::Allowed {
            remaining: limit - entry.count,
        }
    }

    fn purge_expired(&self, window: Duration, now: Instant) -> usize {
        let mut map = match self.windows.lock() {
            Ok(m) => m,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = map.len();
        map.retain(|_, w| now.saturating_duration_since(w.started) < window);
        before - map.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RatePolicy {
    pub limit: u32,
    pub window: Duration,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            limit: 20,
            window: Duration::from_secs(60),
        }
    }
}

pub struct RateLimiter<S: RateLimitStore = MemoryStore> {
    policy: RatePolicy,
    store: S,
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn new(policy: RatePolicy, store: S) -> Self {
        Self { policy, store }
    }

    /// Forgets identities whose window under this policy has elapsed.
    pub fn purge(&self, now: Instant) -> usize {
        let removed = self.store.purge_expired(self.policy.window, now);
        if removed > 0 {
            debug!(target: "core::ratelimit", "purged windows={}", removed);
        }
        removed
    }

    pub fn check(&self, session: &Session) -> Result<(), ChatError> {
        self.check_at(session, Instant::now())
    }

    pub fn check_at(&self, session: &Session, now: Instant) -> Result<(), ChatError> {
        match self
            .store
            .hit(&session.user_id, self.policy.limit, self.policy.window, now)
        {
            Decision::Allowed { remaining } => {
                debug!(target: "core::ratelimit", "allowed user={} remaining={}", session.user_id, remaining);
                Ok(())
            }
            Decision::Limited { retry_after } => {
                let secs = retry_after.as_secs().max(1);
                Err(ChatError::RateLimit(format!(
                    "Too many messages, try again in {}s",
                    secs
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(limit: u32) -> RatePolicy {
        RatePolicy {
            limit,
            window: Duration::from_secs(60),
        }
    }

    #[test]
    fn limits_within_window_then_resets() {
        let limiter = RateLimiter::new(policy(2), MemoryStore::new());
        let s = Session::new("u1", "t").unwrap();
        let t0 = Instant::now();
        assert!(limiter.check_at(&s, t0).is_ok());
        assert!(limiter.check_at(&s, t0 + Duration::from_secs(1)).is_ok());
        let err = limiter.check_at(&s, t0 + Duration::from_secs(50)).unwrap_err();
        assert_eq!(err, ChatError::RateLimit("Too many messages, try again in 10s".into()));
        assert!(limiter.check_at(&s, t0 + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn identities_are_independent() {
        let limiter = RateLimiter::new(policy(1), MemoryStore::new());
        let a = Session::new("a", "t").unwrap();
        let b = Session::new("b", "t").unwrap();
        let now = Instant::now();
        assert!(limiter.check_at(&a, now).is_ok());
        assert!(limiter.check_at(&a, now).is_err());
        assert!(limiter.check_at(&b, now).is_ok());
    }

    #[test]
    fn purge_drops_stale_windows() {
        let store = MemoryStore::new();
        let w = Duration::from_secs(10);
        let t0 = Instant::now();
        store.hit("a", 5, w, t0);
        store.hit("b", 5, w, t0 + Duration::from_secs(8));
        assert_eq!(store.purge_expired(w, t0 + Duration::from_secs(12)), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn limiter_purge_uses_policy_window() {
        let limiter = RateLimiter::new(policy(1), MemoryStore::new());
        let s = Session::new("u1", "t").unwrap();
        let t0 = Instant::now();
        assert!(limiter.check_at(&s, t0).is_ok());
        assert_eq!(limiter.purge(t0 + Duration::from_secs(30)), 0);
        assert!(limiter.check_at(&s, t0 + Duration::from_secs(30)).is_err());
        assert_eq!(limiter.purge(t0 + Duration::from_secs(60)), 1);
        assert!(limiter.check_at(&s, t0 + Duration::from_secs(60)).is_ok());
    }
}
