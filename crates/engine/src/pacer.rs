//! Inter-call pacing at the provider boundary.
//!
//! Batch operations process items sequentially with a pause between
//! provider calls, trading throughput for rate-limit safety. The gate is a
//! trait so tests run without wall-clock waits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Default gap between provider calls in batch operations.
pub const DEFAULT_SYNC_DELAY: Duration = Duration::from_millis(500);

/// A gate the engine awaits between consecutive items in a batch.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

#[async_trait]
impl<P> Pacer for Arc<P>
where
    P: Pacer + ?Sized,
{
    async fn pause(&self) {
        (**self).pause().await
    }
}

/// Fixed-interval gate: sleeps the same duration on every pause.
#[derive(Debug, Clone)]
pub struct FixedDelayPacer {
    delay: Duration,
}

impl FixedDelayPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedDelayPacer {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_DELAY)
    }
}

#[async_trait]
impl Pacer for FixedDelayPacer {
    async fn pause(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// No-op gate for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPacer;

#[async_trait]
impl Pacer for NoopPacer {
    async fn pause(&self) {}
}
