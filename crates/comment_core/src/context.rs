//! Caller-supplied call context.
//!
//! Every store call is synchronous and blocking; the only cancellation
//! signal is the optional deadline carried here and checked before each
//! query is issued.

use std::time::{Duration, Instant};

/// Deadline carrier threaded through service, repository and store calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallContext {
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context without a deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Context expiring `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::CallContext;
    use std::time::{Duration, Instant};

    #[test]
    fn background_never_expires() {
        let ctx = CallContext::background();
        assert!(ctx.deadline().is_none());
        assert!(!ctx.is_expired());
    }

    #[test]
    fn past_deadline_is_expired() {
        let ctx = CallContext::with_deadline(Instant::now());
        std::thread::sleep(Duration::from_millis(1));
        assert!(ctx.is_expired());
    }

    #[test]
    fn generous_timeout_is_not_expired() {
        let ctx = CallContext::with_timeout(Duration::from_secs(60));
        assert!(!ctx.is_expired());
    }
}
