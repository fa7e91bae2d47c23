//! Deadlines and cancellation for store calls

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{StoreTimeoutError, TimeoutReason};

/// Shared flag another thread can raise to stop in-flight store calls
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Point in time after which a store call is abandoned
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    at: Option<Instant>,
    token: CancellationToken,
}

impl Deadline {
    /// No time limit; still cancellable through `token()`
    pub fn none() -> Self {
        Self::default()
    }

    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
            token: CancellationToken::new(),
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self {
            at: Some(instant),
            token: CancellationToken::new(),
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Why the call should stop, if it should
    pub fn interruption(&self) -> Option<TimeoutReason> {
        if self.token.is_cancelled() {
            Some(TimeoutReason::Cancelled)
        } else if self.is_expired() {
            Some(TimeoutReason::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Fail fast before sending `statement`
    pub fn check(&self, statement: &str) -> Result<(), StoreTimeoutError> {
        match self.interruption() {
            Some(reason) => Err(StoreTimeoutError {
                statement: statement.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}
