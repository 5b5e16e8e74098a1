//! Deadlines bounding remote operations.

use std::time::{Duration, Instant};

use crate::domain::error::DispatchError;

/// An optional point in time after which remote work must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No deadline.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// Expires `timeout` from now. A zero timeout means no deadline.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        if timeout.is_zero() {
            Self(None)
        } else {
            Self(Instant::now().checked_add(timeout))
        }
    }

    /// Remaining time, `None` when unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|d| d.is_zero())
    }

    /// Fails with a connection error once expired.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Connection`] naming `operation` when the
    /// deadline has passed.
    pub fn check(&self, operation: &str) -> Result<(), DispatchError> {
        if self.is_expired() {
            return Err(DispatchError::Connection(format!(
                "deadline exceeded during {operation}"
            )));
        }
        Ok(())
    }

    /// Remaining time in milliseconds for libssh2 (`0` = wait forever),
    /// never below 1ms for a bounded deadline.
    #[must_use]
    pub fn timeout_ms(&self) -> u32 {
        match self.remaining() {
            None => 0,
            Some(d) => u32::try_from(d.as_millis()).unwrap_or(u32::MAX).max(1),
        }
    }

    /// Earlier of `self` and `now + timeout`.
    #[must_use]
    pub fn min_with(self, timeout: Duration) -> Self {
        let other = Self::after(timeout);
        match (self.0, other.0) {
            (Some(a), Some(b)) => Self(Some(a.min(b))),
            (Some(a), None) | (None, Some(a)) => Self(Some(a)),
            (None, None) => Self(None),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}
