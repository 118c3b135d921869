//! Sliding-window admission control.
//!
//! Per-identity request timestamps in a true sliding window: each
//! check prunes the caller's own history, and a global sweep (at most
//! once per window) evicts identities that went idle. Rejected
//! attempts are not recorded, so a client hammering a full window
//! does not push its own recovery further out.
//!
//! Enforcement is per process instance; running several instances
//! multiplies the effective limit accordingly.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use quorum_core::config::RateLimitConfig;
use quorum_core::{Error, Result};
use tracing::{debug, warn};

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    inner: Mutex<Inner>,
}

struct Inner {
    clients: HashMap<String, Vec<Instant>>,
    last_sweep: Instant,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            max_requests: config.requests_per_window as usize,
            window: Duration::from_secs(config.window_seconds),
            inner: Mutex::new(Inner {
                clients: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Admit or reject one request from `identity`. Rejections carry
    /// the window length as a fixed retry-after hint.
    pub fn check(&self, identity: &str) -> Result<()> {
        self.check_at(identity, Instant::now())
    }

    fn check_at(&self, identity: &str, now: Instant) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();

        if now.duration_since(inner.last_sweep) >= self.window {
            inner.last_sweep = now;
            let window = self.window;
            inner.clients.retain(|_, timestamps| {
                timestamps.retain(|t| now.duration_since(*t) < window);
                !timestamps.is_empty()
            });
            debug!(identities = inner.clients.len(), "Rate limiter sweep");
        }

        let timestamps = inner.clients.entry(identity.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            warn!(
                %identity,
                count = timestamps.len(),
                limit = self.max_requests,
                "Rate limited"
            );
            return Err(Error::RateLimited {
                retry_after_secs: self.window.as_secs(),
            });
        }

        timestamps.push(now);
        Ok(())
    }

    #[cfg(test)]
    fn tracked_identities(&self) -> usize {
        self.inner.lock().unwrap().clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_window: max,
            window_seconds: window_secs,
        })
    }

    #[test]
    fn test_admits_up_to_limit_then_rejects() {
        let limiter = limiter(3, 60);
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("1.2.3.4", now).is_ok());
        }
        let err = limiter.check_at("1.2.3.4", now).unwrap_err();
        match err {
            Error::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 60),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejections_not_recorded() {
        let limiter = limiter(2, 60);
        let start = Instant::now();

        assert!(limiter.check_at("c", start).is_ok());
        assert!(limiter.check_at("c", start).is_ok());
        // A burst of rejected attempts later in the window...
        let later = start + Duration::from_secs(30);
        for _ in 0..10 {
            assert!(limiter.check_at("c", later).is_err());
        }
        // ...does not delay recovery past the original window.
        let recovered = start + Duration::from_secs(61);
        assert!(limiter.check_at("c", recovered).is_ok());
    }

    #[test]
    fn test_window_slides() {
        let limiter = limiter(2, 60);
        let start = Instant::now();

        assert!(limiter.check_at("c", start).is_ok());
        assert!(limiter.check_at("c", start + Duration::from_secs(30)).is_ok());
        assert!(limiter.check_at("c", start + Duration::from_secs(40)).is_err());
        // First request has aged out; one slot is free again
        assert!(limiter.check_at("c", start + Duration::from_secs(61)).is_ok());
        assert!(limiter.check_at("c", start + Duration::from_secs(62)).is_err());
    }

    #[test]
    fn test_identities_isolated() {
        let limiter = limiter(1, 60);
        let now = Instant::now();

        assert!(limiter.check_at("a", now).is_ok());
        assert!(limiter.check_at("b", now).is_ok());
        assert!(limiter.check_at("a", now).is_err());
        assert!(limiter.check_at("b", now).is_err());
    }

    #[test]
    fn test_sweep_evicts_idle_identities() {
        let limiter = limiter(5, 60);
        let start = Instant::now();

        assert!(limiter.check_at("idle", start).is_ok());
        assert_eq!(limiter.tracked_identities(), 1);

        // A check from someone else two windows later triggers the
        // sweep and drops the idle identity.
        assert!(limiter
            .check_at("active", start + Duration::from_secs(121))
            .is_ok());
        assert_eq!(limiter.tracked_identities(), 1);
    }
}
