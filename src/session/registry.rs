//! Process-wide adapter bootstrap registry.
//!
//! The adapter listens inside the interpreter process; bootstrapping it a
//! second time breaks the first listener. Session restarts within one
//! kernel process therefore reuse the first bootstrap outcome, successful
//! or not. The registry is explicit state injected at bridge construction
//! (kernels pass [`BootstrapRegistry::global`]); tests inject a fresh one.
//! There is no teardown: the outcome lives as long as the process.

use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, PoisonError};

static GLOBAL: Lazy<Arc<BootstrapRegistry>> = Lazy::new(|| Arc::new(BootstrapRegistry::new()));

#[derive(Debug, Default)]
pub struct BootstrapRegistry {
    outcome: Mutex<Option<bool>>,
}

impl BootstrapRegistry {
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
        }
    }

    /// The registry every kernel session shares by default.
    pub fn global() -> Arc<Self> {
        GLOBAL.clone()
    }

    /// Run `bootstrap` on the first call only; later calls return the
    /// recorded outcome without retrying.
    pub fn ensure(&self, bootstrap: impl FnOnce() -> bool) -> bool {
        let mut outcome = self
            .outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *outcome.get_or_insert_with(bootstrap)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bootstrap_runs_once() {
        let registry = BootstrapRegistry::new();
        let mut calls = 0;
        assert!(registry.ensure(|| {
            calls += 1;
            true
        }));
        assert!(registry.ensure(|| {
            calls += 1;
            true
        }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_failed_bootstrap_is_not_retried() {
        let registry = BootstrapRegistry::new();
        let mut calls = 0;
        assert!(!registry.ensure(|| {
            calls += 1;
            false
        }));
        assert!(!registry.ensure(|| {
            calls += 1;
            true
        }));
        assert_eq!(calls, 1);
    }
}
