//! Rate limiting for password attempts.
//!
//! Unlock attempts are limited per principal, so guessing an access
//! password is throttled no matter which file or folder is targeted.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    collections::HashMap,
    num::NonZeroU32,
    sync::{Arc, RwLock},
    time::Duration,
};

/// Rate limiter for a single principal.
pub type PrincipalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// State for rate limiting.
#[derive(Clone)]
pub struct RateLimitState {
    /// Per-principal limiters for unlock attempts.
    unlock_limiters: Arc<RwLock<HashMap<i64, Arc<PrincipalRateLimiter>>>>,
    /// Unlock attempts allowed per minute.
    unlock_rate_limit: u32,
}

impl RateLimitState {
    /// Create a new rate limit state.
    pub fn new(unlock_rate_limit: u32) -> Self {
        Self {
            unlock_limiters: Arc::new(RwLock::new(HashMap::new())),
            unlock_rate_limit,
        }
    }

    /// Get or create the limiter for a principal.
    fn get_or_create_limiter(&self, user_id: i64) -> Arc<PrincipalRateLimiter> {
        {
            let read_guard = self
                .unlock_limiters
                .read()
                .unwrap_or_else(|e| e.into_inner());
            if let Some(limiter) = read_guard.get(&user_id) {
                return limiter.clone();
            }
        }

        let mut write_guard = self
            .unlock_limiters
            .write()
            .unwrap_or_else(|e| e.into_inner());

        // Double-check after acquiring write lock
        if let Some(limiter) = write_guard.get(&user_id) {
            return limiter.clone();
        }

        let quota =
            Quota::per_minute(NonZeroU32::new(self.unlock_rate_limit).unwrap_or(NonZeroU32::MIN));
        let limiter = Arc::new(RateLimiter::direct(quota));
        write_guard.insert(user_id, limiter.clone());
        limiter
    }

    /// Check if another unlock attempt is allowed for the principal.
    pub fn check_unlock(&self, user_id: i64) -> bool {
        let allowed = self.get_or_create_limiter(user_id).check().is_ok();
        if !allowed {
            tracing::warn!(user_id, "unlock rate limit exceeded");
        }
        allowed
    }

    /// Number of principals currently tracked.
    pub fn tracked(&self) -> usize {
        self.unlock_limiters
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Drop limiters nobody else holds.
    pub fn cleanup(&self) {
        let mut guard = self
            .unlock_limiters
            .write()
            .unwrap_or_else(|e| e.into_inner());
        guard.retain(|_, v| Arc::strong_count(v) > 1);
    }

    /// Start a background task to periodically clean up old entries.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await; // Every 5 minutes
                self.cleanup();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_state_new() {
        let state = RateLimitState::new(5);
        assert_eq!(state.unlock_rate_limit, 5);
        assert_eq!(state.tracked(), 0);
    }

    #[test]
    fn test_unlock_rate_limit() {
        let state = RateLimitState::new(3);

        assert!(state.check_unlock(1));
        assert!(state.check_unlock(1));
        assert!(state.check_unlock(1));

        // 4th attempt within the minute is refused
        assert!(!state.check_unlock(1));

        // Another principal has its own budget
        assert!(state.check_unlock(2));
    }

    #[test]
    fn test_cleanup_drops_idle_limiters() {
        let state = RateLimitState::new(3);
        state.check_unlock(1);
        state.check_unlock(2);
        assert_eq!(state.tracked(), 2);

        state.cleanup();
        assert_eq!(state.tracked(), 0);
    }

    #[test]
    fn test_zero_limit_falls_back_to_one() {
        let state = RateLimitState::new(0);
        assert!(state.check_unlock(1));
        assert!(!state.check_unlock(1));
    }
}
