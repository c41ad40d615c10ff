//! Rate limiting module to slow down credential guessing

use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::constants::MAX_THROTTLE_TRACKED_KEYS;

/// Login attempt counter per login identifier, sliding window.
///
/// An attempt is counted when it starts, in the same critical section as the
/// limit check, so concurrent guesses cannot overshoot `max_failures`. A
/// successful login clears the key; an attempt that ended without a
/// credential verdict is released. Memory is bounded by evicting the least
/// recently touched key.
///
/// Keys are login identifiers, so anyone who knows an address can lock its
/// owner out for one window. That is accepted in exchange for stopping
/// distributed guessing against a single account.
pub struct LoginThrottle {
    attempts: Mutex<LruCache<String, Vec<Instant>>>,
    max_failures: u32,
    window: Duration,
}

/// A counted attempt, returned by [`LoginThrottle::reserve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    at: Option<Instant>,
}

impl LoginThrottle {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self::with_capacity(max_failures, window, MAX_THROTTLE_TRACKED_KEYS)
    }

    pub fn with_capacity(max_failures: u32, window: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            attempts: Mutex::new(LruCache::new(capacity)),
            max_failures,
            window,
        }
    }

    /// Counts an attempt against `key`. Returns `Err(retry_after)` instead
    /// while the key is locked out.
    pub async fn reserve(&self, key: &str) -> Result<Reservation, Duration> {
        if self.max_failures == 0 {
            return Ok(Reservation { at: None });
        }
        let now = Instant::now();
        let mut attempts = self.attempts.lock().await;

        if let Some(times) = attempts.get_mut(key) {
            times.retain(|&t| now.duration_since(t) < self.window);
            if times.len() >= self.max_failures as usize {
                let oldest = times.first().copied().unwrap_or(now);
                let retry_after = self.window.saturating_sub(now.duration_since(oldest));
                return Err(retry_after.max(Duration::from_secs(1)));
            }
            times.push(now);
        } else {
            if attempts.len() == attempts.cap().get() {
                log::debug!("Login throttle full, evicting least recently used key");
            }
            attempts.put(key.to_string(), vec![now]);
        }
        Ok(Reservation { at: Some(now) })
    }

    /// Uncounts an attempt that failed for reasons other than bad credentials
    pub async fn release(&self, key: &str, reservation: Reservation) {
        let Some(at) = reservation.at else {
            return;
        };
        let mut attempts = self.attempts.lock().await;
        if let Some(times) = attempts.get_mut(key) {
            if let Some(index) = times.iter().position(|&t| t == at) {
                times.remove(index);
            }
            if times.is_empty() {
                attempts.pop(key);
            }
        }
    }

    pub async fn clear(&self, key: &str) {
        self.attempts.lock().await.pop(key);
    }

    pub async fn failure_count(&self, key: &str) -> usize {
        let now = Instant::now();
        let attempts = self.attempts.lock().await;
        attempts
            .peek(key)
            .map(|times| {
                times
                    .iter()
                    .filter(|&&t| now.duration_since(t) < self.window)
                    .count()
            })
            .unwrap_or(0)
    }

    pub async fn tracked_keys(&self) -> usize {
        self.attempts.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_locks_out_after_max_failures() {
        let throttle = LoginThrottle::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(throttle.reserve("a@x.edu").await.is_ok());
        }

        let retry_after = throttle.reserve("a@x.edu").await.unwrap_err();
        assert!(retry_after <= Duration::from_secs(60));
        assert!(throttle.reserve("b@x.edu").await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_attempts_never_exceed_limit() {
        let throttle = Arc::new(LoginThrottle::new(5, Duration::from_secs(60)));

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let throttle = throttle.clone();
                tokio::spawn(async move { throttle.reserve("a@x.edu").await.is_ok() })
            })
            .collect();
        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 5);
        assert_eq!(throttle.failure_count("a@x.edu").await, 5);
    }

    #[tokio::test]
    async fn test_release_uncounts_attempt() {
        let throttle = LoginThrottle::new(2, Duration::from_secs(60));
        let first = throttle.reserve("a@x.edu").await.unwrap();
        throttle.reserve("a@x.edu").await.unwrap();
        assert!(throttle.reserve("a@x.edu").await.is_err());

        throttle.release("a@x.edu", first).await;
        assert_eq!(throttle.failure_count("a@x.edu").await, 1);
        assert!(throttle.reserve("a@x.edu").await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_resets_key() {
        let throttle = LoginThrottle::new(2, Duration::from_secs(60));
        throttle.reserve("a@x.edu").await.unwrap();
        throttle.reserve("a@x.edu").await.unwrap();
        assert!(throttle.reserve("a@x.edu").await.is_err());

        throttle.clear("a@x.edu").await;
        assert_eq!(throttle.failure_count("a@x.edu").await, 0);
        assert!(throttle.reserve("a@x.edu").await.is_ok());
    }

    #[tokio::test]
    async fn test_window_expiry() {
        let throttle = LoginThrottle::new(1, Duration::from_millis(20));
        throttle.reserve("a@x.edu").await.unwrap();
        assert!(throttle.reserve("a@x.edu").await.is_err());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(throttle.reserve("a@x.edu").await.is_ok());
    }

    #[tokio::test]
    async fn test_memory_is_bounded() {
        let throttle = LoginThrottle::with_capacity(5, Duration::from_secs(60), 2);
        throttle.reserve("a").await.unwrap();
        throttle.reserve("b").await.unwrap();
        throttle.reserve("c").await.unwrap();

        assert_eq!(throttle.tracked_keys().await, 2);
        assert_eq!(throttle.failure_count("a").await, 0);
    }

    #[tokio::test]
    async fn test_zero_disables_throttle() {
        let throttle = LoginThrottle::new(0, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(throttle.reserve("a").await.is_ok());
        }
        assert_eq!(throttle.tracked_keys().await, 0);
    }
}
