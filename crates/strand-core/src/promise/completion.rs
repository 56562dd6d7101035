use std::sync::{Arc, Weak};

use tracing::trace;

use super::state::Inner;
use crate::error::Error;

/// Settles the promise it was handed out for.
///
/// Holds only a weak link: once the promise is released, settling becomes a no-op.
/// Clones share the same target, and only the first settlement counts.
pub struct Completion<T> {
    target: Weak<Inner<T>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
        }
    }
}

impl<T: Send + 'static> Completion<T> {
    pub(crate) fn new(inner: &Arc<Inner<T>>) -> Self {
        Self {
            target: Arc::downgrade(inner),
        }
    }

    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(&self, error: Error) {
        self.settle(Err(error));
    }

    /// Callback-style completion: the error wins if present, and
    /// neither value nor error rejects with [`Error::Unknown`].
    pub fn complete(&self, value: Option<T>, error: Option<Error>) {
        match (value, error) {
            (_, Some(err)) => self.reject(err),
            (Some(value), None) => self.resolve(value),
            (None, None) => self.reject(Error::Unknown),
        }
    }

    pub fn settle(&self, outcome: Result<T, Error>) {
        match self.target.upgrade() {
            Some(inner) => inner.settle(outcome),
            None => trace!("completion for a released promise ignored"),
        }
    }

    /// `false` once the target settled, was cancelled or released.
    pub fn is_pending(&self) -> bool {
        self.target
            .upgrade()
            .is_some_and(|inner| inner.is_pending() && !inner.is_cancelled())
    }
}
