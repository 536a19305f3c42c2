//! Error types for rate limiting.
use std::fmt;
use std::time::Duration;

/// Errors produced by permit acquisition on a [`crate::FixedWindowLimiter`].
///
/// `Denied` is the expected steady-state backpressure signal; callers should
/// match on it to apply their own retry or shedding policy. `InvalidPermits`
/// indicates a programming error and is raised before any ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    /// The limiter did not grant the requested permits within the timeout.
    #[error("rate limiter '{limiter}' did not grant {permits} permit(s) within {timeout:?}")]
    Denied {
        /// Name of the limiter that denied the request.
        limiter: String,
        /// Number of permits requested.
        permits: u32,
        /// Timeout that was in effect when the attempt started.
        timeout: Duration,
    },
    /// The caller asked for zero permits.
    #[error("permit count must be greater than zero (got {provided})")]
    InvalidPermits {
        /// Value provided by the caller.
        provided: u32,
    },
}

impl AcquireError {
    /// Check if this error is a timeout-denied acquisition.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

/// Unified error type for operations executed under a rate limiter.
///
/// Used by [`crate::FixedWindowLimiter::execute`] and the tower middleware so
/// that a denied permit is distinguishable from a failure of the protected
/// operation itself.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitError<E> {
    /// The limiter did not grant the permits within the timeout; the operation
    /// was never invoked.
    Denied {
        /// Name of the limiter that denied the request.
        limiter: String,
        /// Number of permits requested.
        permits: u32,
        /// Timeout that was in effect when the attempt started.
        timeout: Duration,
    },
    /// The caller asked for zero permits.
    InvalidPermits {
        /// Value provided by the caller.
        provided: u32,
    },
    /// The underlying operation failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for RateLimitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Denied { limiter, permits, timeout } => {
                write!(
                    f,
                    "rate limiter '{}' did not grant {} permit(s) within {:?}",
                    limiter, permits, timeout
                )
            }
            Self::InvalidPermits { provided } => {
                write!(f, "permit count must be greater than zero (got {})", provided)
            }
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RateLimitError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> RateLimitError<E> {
    /// Check if this error is a denied acquisition.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    /// Check if this error wraps an inner error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Get the inner error if this is an Inner variant.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Access denial details as (limiter, permits, timeout).
    pub fn denied_details(&self) -> Option<(&str, u32, Duration)> {
        match self {
            Self::Denied { limiter, permits, timeout } => {
                Some((limiter.as_str(), *permits, *timeout))
            }
            _ => None,
        }
    }
}

impl<E> From<AcquireError> for RateLimitError<E> {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::Denied { limiter, permits, timeout } => {
                Self::Denied { limiter, permits, timeout }
            }
            AcquireError::InvalidPermits { provided } => Self::InvalidPermits { provided },
        }
    }
}
