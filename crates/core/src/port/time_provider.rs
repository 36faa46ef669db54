// Time Provider Port (for testability)
use async_trait::async_trait;
use std::time::Duration;

/// Time provider interface (allows mocking in tests)
#[async_trait]
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;

    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);
}

/// System time provider (production)
pub struct SystemTimeProvider;

#[async_trait]
impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    /// Virtual clock: `sleep` advances time instantly
    pub struct MockTimeProvider {
        now: AtomicI64,
        sleeps: AtomicUsize,
    }

    impl MockTimeProvider {
        pub fn new(start_millis: i64) -> Self {
            Self {
                now: AtomicI64::new(start_millis),
                sleeps: AtomicUsize::new(0),
            }
        }

        pub fn sleep_count(&self) -> usize {
            self.sleeps.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TimeProvider for MockTimeProvider {
        fn now_millis(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }

        async fn sleep(&self, duration: Duration) {
            self.sleeps.fetch_add(1, Ordering::SeqCst);
            self.now
                .fetch_add(duration.as_millis() as i64, Ordering::SeqCst);
        }
    }
}
