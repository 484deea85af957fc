//! Lifecycle tokens returned by a started application.
//!
//! A [`LifecycleToken`] stands for "startup has completed and may now be torn
//! down". It owns the teardown actions registered during startup and any
//! tokens handed out by the server factory. Releasing it runs them exactly
//! once:
//!
//! - **Child tokens** (the server factory's token) are released first
//! - **Teardown actions** then run in reverse registration order
//!
//! A token that is dropped without an explicit [`release`](LifecycleToken::release)
//! releases itself, so teardown happens on every exit path.

use conduit_middleware::TeardownAction;
use std::fmt;
use thiserror::Error;

/// Error returned when one or more teardown actions fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// At least one teardown action failed. Remaining actions still ran.
    #[error("Teardown failed: {0}")]
    TeardownFailed(String),
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T = ()> = Result<T, LifecycleError>;

/// Disposable token representing a started application.
///
/// # Example
///
/// ```
/// use conduit_hosting::LifecycleToken;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let closed = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&closed);
///
/// let token = LifecycleToken::new("orders").on_release("close-db", move || {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// });
///
/// token.release().unwrap();
/// assert_eq!(closed.load(Ordering::SeqCst), 1);
/// ```
#[must_use = "dropping a lifecycle token releases it immediately"]
pub struct LifecycleToken {
    name: String,
    actions: Vec<(String, TeardownAction)>,
    children: Vec<LifecycleToken>,
    released: bool,
}

impl LifecycleToken {
    /// Creates a token with no teardown actions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            children: Vec::new(),
            released: false,
        }
    }

    /// Creates a token whose release does nothing.
    pub fn noop() -> Self {
        Self::new("noop")
    }

    /// Adds a named teardown action.
    pub fn on_release<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Result<(), conduit_core::BoxError> + Send + 'static,
    {
        self.actions.push((name.into(), Box::new(action)));
        self
    }

    /// Adds already-boxed teardown actions, keeping their order.
    pub fn with_actions(mut self, actions: Vec<(String, TeardownAction)>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Attaches a child token released before this token's own actions.
    pub fn attach(mut self, child: LifecycleToken) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the token name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of teardown actions, including those of children.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.actions.len()
            + self
                .children
                .iter()
                .map(LifecycleToken::action_count)
                .sum::<usize>()
    }

    /// Returns true if releasing this token would do nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.action_count() == 0
    }

    /// Releases the token.
    ///
    /// Every action runs even if an earlier one fails; failures are collected
    /// into a single [`LifecycleError::TeardownFailed`].
    pub fn release(mut self) -> LifecycleResult {
        self.release_inner()
    }

    fn release_inner(&mut self) -> LifecycleResult {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut errors: Vec<String> = Vec::new();

        for mut child in std::mem::take(&mut self.children) {
            if let Err(LifecycleError::TeardownFailed(e)) = child.release_inner() {
                errors.push(e);
            }
        }

        // Run in reverse order (LIFO)
        for (name, action) in std::mem::take(&mut self.actions).into_iter().rev() {
            tracing::debug!(token = %self.name, action = %name, "Running teardown action");
            match action() {
                Ok(()) => {
                    tracing::debug!(token = %self.name, action = %name, "Teardown action completed");
                }
                Err(e) => {
                    tracing::error!(token = %self.name, action = %name, error = %e, "Teardown action failed");
                    errors.push(format!("{}: {}", name, e));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::TeardownFailed(errors.join("; ")))
        }
    }
}

impl Drop for LifecycleToken {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!(token = %self.name, "Releasing lifecycle token on drop");
            // Errors were already logged per action.
            let _ = self.release_inner();
        }
    }
}

impl fmt::Debug for LifecycleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleToken")
            .field("name", &self.name)
            .field("actions", &self.actions.len())
            .field("children", &self.children.len())
            .field("released", &self.released)
            .finish()
    }
}
