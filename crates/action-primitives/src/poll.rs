//! Condition polling with exponential backoff.
//!
//! Fixed sleeps become "poll until the condition holds, at most this long".
//! The bound keeps the worst case identical to a fixed delay while the common
//! case returns as soon as the game catches up.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::errors::ActionError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Give up once this much time has passed.
    pub upper_bound: Duration,
    pub initial: Duration,
    pub max_interval: Duration,
    pub factor: u32,
}

impl PollPolicy {
    pub fn bounded(upper_bound: Duration) -> Self {
        Self {
            upper_bound,
            initial: Duration::from_millis(50),
            max_interval: Duration::from_millis(500),
            factor: 2,
        }
    }

    pub fn bounded_ms(upper_bound_ms: u64) -> Self {
        Self::bounded(Duration::from_millis(upper_bound_ms))
    }

    pub fn with_initial(mut self, initial: Duration) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    pub fn start(&self) -> Backoff {
        Backoff {
            policy: *self,
            deadline: Instant::now() + self.upper_bound,
            next: self.initial,
        }
    }
}

/// Stateful pacing for a hand-written poll loop:
///
/// ```ignore
/// let mut backoff = policy.start();
/// loop {
///     if condition().await? { break; }
///     if !backoff.wait().await { break; }
/// }
/// ```
#[derive(Debug)]
pub struct Backoff {
    policy: PollPolicy,
    deadline: Instant,
    next: Duration,
}

impl Backoff {
    /// Sleep until the next check. Returns `false` once the bound is spent.
    pub async fn wait(&mut self) -> bool {
        let now = Instant::now();
        if now >= self.deadline {
            return false;
        }
        let pause = self.next.min(self.deadline - now);
        sleep(pause).await;
        let grown = self.next.saturating_mul(self.policy.factor.max(1));
        self.next = grown.min(self.policy.max_interval).max(Duration::from_millis(1));
        true
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Evaluate `predicate` until it holds or the policy's bound is spent.
///
/// The predicate is always evaluated at least once and once more right at the
/// bound. Errors from the predicate abort the poll.
pub async fn poll_until<F, Fut>(policy: PollPolicy, mut predicate: F) -> Result<bool, ActionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ActionError>>,
{
    let mut backoff = policy.start();
    loop {
        if predicate().await? {
            return Ok(true);
        }
        if !backoff.wait().await {
            return Ok(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn returns_as_soon_as_condition_holds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = Instant::now();

        let held = poll_until(PollPolicy::bounded_ms(3_000), move || {
            let counter = counter.clone();
            async move { Ok(counter.fetch_add(1, Ordering::SeqCst) >= 2) }
        })
        .await
        .unwrap();

        assert!(held);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 50ms + 100ms of backoff before the third call
        assert_eq!(started.elapsed(), Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_upper_bound() {
        let started = Instant::now();
        let held = poll_until(PollPolicy::bounded_ms(1_000), || async { Ok(false) })
            .await
            .unwrap();
        assert!(!held);
        assert_eq!(started.elapsed(), Duration::from_millis(1_000));
    }

    #[tokio::test(start_paused = true)]
    async fn predicate_errors_abort() {
        let result = poll_until(PollPolicy::bounded_ms(1_000), || async {
            Err(ActionError::Internal("lookup failed".into()))
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_caps_interval() {
        let policy = PollPolicy::bounded(Duration::from_secs(10))
            .with_initial(Duration::from_millis(400))
            .with_max_interval(Duration::from_millis(600));
        let mut backoff = policy.start();
        let started = Instant::now();
        assert!(backoff.wait().await);
        assert!(backoff.wait().await);
        assert!(backoff.wait().await);
        assert_eq!(started.elapsed(), Duration::from_millis(400 + 600 + 600));
    }
}
