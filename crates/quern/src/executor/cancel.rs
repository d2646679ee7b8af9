use crate::executor::ExecuteError;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

///
/// CancelToken
///
/// Cooperative cancellation: a shared flag plus an optional deadline.
/// Clones observe the same flag. Executors call `checkpoint()` at row
/// granularity; a tripped token aborts the in-flight operation with
/// `ExecuteError::Cancelled` before any partial state is committed.
///

#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never cancels unless asked to.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that trips automatically after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    /// Trip the token. Every clone observes the cancellation.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        self.inner
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Abort point for executors.
    pub fn checkpoint(&self) -> Result<(), ExecuteError> {
        if self.is_cancelled() {
            return Err(ExecuteError::Cancelled);
        }
        Ok(())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tokens_pass_checkpoints() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.checkpoint().is_ok());
    }

    #[test]
    fn cancellation_is_shared_across_clones() {
        let token = CancelToken::new();
        let clone = token.clone();

        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.checkpoint(), Err(ExecuteError::Cancelled)));
    }

    #[test]
    fn elapsed_deadlines_trip_the_token() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
    }
}
