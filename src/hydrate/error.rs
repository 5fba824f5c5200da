//! Errors shared between every caller of a hydration attempt.

use std::sync::Arc;

use thiserror::Error;

use super::key::CacheKey;

/// Outcome error of a hydration.
///
/// The same error instance is handed to the caller that ran the computation and
/// to every task that was waiting on it, so it has to be cheap to clone.
#[derive(Debug, Clone, Error)]
pub enum HydrateError {
    /// The wrapped computation failed. Never cached.
    #[error("{0:#}")]
    Computation(Arc<anyhow::Error>),

    /// The computation for this key tried to resolve the same key again.
    #[error("re-entrant hydration of cache key `{0}`")]
    Reentrant(CacheKey),
}

impl HydrateError {
    /// Returns `true` for errors produced by the wrapped computation.
    pub fn is_computation(&self) -> bool {
        matches!(self, HydrateError::Computation(_))
    }

    /// The underlying computation error, if any.
    pub fn source_error(&self) -> Option<&anyhow::Error> {
        match self {
            HydrateError::Computation(err) => Some(err),
            HydrateError::Reentrant(_) => None,
        }
    }
}

impl From<anyhow::Error> for HydrateError {
    fn from(err: anyhow::Error) -> Self {
        HydrateError::Computation(Arc::new(err))
    }
}
