use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Sliding-window cap on uploads, shared by every upload path.
#[derive(Debug)]
pub struct UploadRateLimiter {
    max_per_window: usize,
    window: Duration,
    recent: Mutex<VecDeque<Instant>>,
}

impl UploadRateLimiter {
    pub fn per_minute(max: usize) -> Self {
        Self::new(max, Duration::from_secs(60))
    }

    /// `max_per_window == 0` disables limiting.
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Waits until another upload fits in the window, then claims the slot.
    pub async fn acquire(&self) {
        if self.max_per_window == 0 {
            return;
        }
        loop {
            let wait = {
                let mut recent = self.recent.lock().await;
                let now = Instant::now();
                while recent
                    .front()
                    .is_some_and(|started| now.duration_since(*started) >= self.window)
                {
                    recent.pop_front();
                }
                if recent.len() < self.max_per_window {
                    recent.push_back(now);
                    return;
                }
                match recent.front() {
                    Some(oldest) => self.window - now.duration_since(*oldest),
                    None => Duration::ZERO,
                }
            };
            debug!(wait_ms = wait.as_millis() as u64, "upload rate limit reached; waiting");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn blocks_once_window_is_full() {
        let limiter = UploadRateLimiter::per_minute(3);
        let started = Instant::now();

        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(1));

        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn slots_free_up_as_the_window_slides() {
        let limiter = UploadRateLimiter::new(2, Duration::from_secs(10));
        let started = Instant::now();

        limiter.acquire().await;
        tokio::time::sleep(Duration::from_secs(4)).await;
        limiter.acquire().await;
        // Oldest slot expires at t=10s.
        limiter.acquire().await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(11), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_disables_the_limit() {
        let limiter = UploadRateLimiter::per_minute(0);
        let started = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(1));
    }
}
