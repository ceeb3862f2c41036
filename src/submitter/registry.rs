//! Per-module registry initialization state
//!
//! Each contract module needs its registry resource published before domain
//! calls succeed. The tracker makes sure concurrent callers for the same module
//! collapse into one initialization attempt: the first caller moves the module
//! to `Initializing` and runs the initializer, everybody else waits for the
//! state to change and re-checks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Notify;
use tracing::debug;

use crate::classifier::ClassifiedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryInitState {
    Unknown,
    Initializing,
    Initialized,
}

#[derive(Debug, Default)]
pub struct RegistryTracker {
    states: Mutex<HashMap<String, RegistryInitState>>,
    changed: Notify,
}

impl RegistryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, module: &str) -> RegistryInitState {
        self.states
            .lock()
            .get(module)
            .copied()
            .unwrap_or(RegistryInitState::Unknown)
    }

    /// Forget what we know about `module`, e.g. after the ledger was reset
    ///
    /// An initialization in flight is left alone: it is about to publish the
    /// registry, and waiters must keep waiting on it rather than start another.
    pub fn invalidate(&self, module: &str) {
        let mut states = self.states.lock();
        match states.get(module).copied() {
            Some(RegistryInitState::Initializing) => {
                debug!(module, "Registry initialization in flight, invalidation ignored");
            }
            Some(_) => {
                states.remove(module);
                drop(states);
                debug!(module, "Registry state invalidated");
                self.changed.notify_waiters();
            }
            None => {}
        }
    }

    /// Run `init` unless `module` is already initialized or being initialized
    ///
    /// Waiters return `Ok(())` once the in-flight initialization succeeds. If it
    /// fails, its error goes to the caller that ran it and the module falls back
    /// to `Unknown`, so the next waiter takes over.
    pub async fn ensure_initialized<F, Fut>(
        &self,
        module: &str,
        init: F,
    ) -> Result<(), ClassifiedError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ClassifiedError>>,
    {
        loop {
            // Registered before the check so a transition between the check and
            // the await is not missed.
            let changed = self.changed.notified();
            {
                let mut states = self.states.lock();
                match states.get(module).copied() {
                    Some(RegistryInitState::Initialized) => return Ok(()),
                    Some(RegistryInitState::Initializing) => {}
                    Some(RegistryInitState::Unknown) | None => {
                        states.insert(module.to_string(), RegistryInitState::Initializing);
                        break;
                    }
                }
            }
            debug!(module, "Registry initialization in flight, waiting");
            changed.await;
        }

        // Reset to Unknown if the initializer is dropped mid-flight
        let guard = scopeguard::guard((), |_| {
            self.finish(module, RegistryInitState::Unknown);
        });
        let result = init().await;
        scopeguard::ScopeGuard::into_inner(guard);

        let next = if result.is_ok() {
            RegistryInitState::Initialized
        } else {
            RegistryInitState::Unknown
        };
        self.finish(module, next);
        result
    }

    fn finish(&self, module: &str, state: RegistryInitState) {
        self.states.lock().insert(module.to_string(), state);
        self.changed.notify_waiters();
    }
}
