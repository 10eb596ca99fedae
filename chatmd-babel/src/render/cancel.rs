//! Cooperative cancellation for the chunked render loop
//!
//! The loop checks a [`RenderBudget`] between chunks. Cancellation is never
//! preemptive: a chunk that is already inside the Markdown engine runs to
//! completion, and the loop stops before the next one.

use crate::error::RenderError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cloneable flag a caller can flip from another thread to abort a render
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Deadline plus cancellation token for one render
#[derive(Debug, Clone)]
pub struct RenderBudget {
    started: Instant,
    timeout: Duration,
    token: CancellationToken,
}

impl RenderBudget {
    pub fn new(timeout: Duration, token: CancellationToken) -> Self {
        Self {
            started: Instant::now(),
            timeout,
            token,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail if the render was cancelled or ran past its deadline
    pub fn check(&self) -> Result<(), RenderError> {
        if self.token.is_cancelled() {
            return Err(RenderError::Aborted);
        }
        if self.elapsed() >= self.timeout {
            return Err(RenderError::Timeout(self.timeout.as_millis()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_budget_passes() {
        let budget = RenderBudget::new(Duration::from_secs(5), CancellationToken::new());
        assert_eq!(budget.check(), Ok(()));
    }

    #[test]
    fn cancelled_token_aborts() {
        let token = CancellationToken::new();
        let budget = RenderBudget::new(Duration::from_secs(5), token.clone());
        token.cancel();
        assert_eq!(budget.check(), Err(RenderError::Aborted));
    }

    #[test]
    fn expired_deadline_times_out() {
        let budget = RenderBudget::new(Duration::ZERO, CancellationToken::new());
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(budget.check(), Err(RenderError::Timeout(0)));
    }
}
