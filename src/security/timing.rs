//! Timing attack protection utilities
//!
//! Failed logins are padded to a minimum duration so an attacker cannot
//! tell an unknown account from a wrong password by response time.

use std::time::{Duration, Instant};

/// Authentication timing helper
pub struct AuthTimer {
    start: Instant,
    min_duration: Duration,
}

impl AuthTimer {
    /// Create a new auth timer with minimum duration
    pub fn new(min_duration: Duration) -> Self {
        Self {
            start: Instant::now(),
            min_duration,
        }
    }

    /// Wait until minimum duration has elapsed
    pub async fn wait(self) {
        let elapsed = self.start.elapsed();
        if elapsed < self.min_duration {
            tokio::time::sleep(self.min_duration - elapsed).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_auth_timer() {
        let timer = AuthTimer::new(Duration::from_millis(10));
        let start = Instant::now();
        timer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_no_delay_once_elapsed() {
        let timer = AuthTimer {
            start: Instant::now() - Duration::from_millis(50),
            min_duration: Duration::from_millis(10),
        };
        let before = Instant::now();
        timer.wait().await;
        assert!(before.elapsed() < Duration::from_millis(10));
    }
}
