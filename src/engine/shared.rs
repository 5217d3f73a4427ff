//! Thread-safe engine handle.
//!
//! Each transaction holds the mutex for its whole run, so two liquidators
//! racing for the same job are serialized and only the first one can claim
//! it. A transaction that tries to open another one from the same thread
//! (a collaborator calling back in) is rejected instead of deadlocking.

use super::core::Engine;
use super::results::EngineError;
use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

thread_local! {
    static IN_TRANSACTION: Cell<bool> = const { Cell::new(false) };
}

// clears the thread's transaction flag on every exit path, unwinding included
struct TransactionGuard;

impl TransactionGuard {
    fn enter() -> Result<Self, EngineError> {
        if IN_TRANSACTION.with(|flag| flag.replace(true)) {
            tracing::warn!("nested engine transaction rejected");
            return Err(EngineError::TransactionInProgress);
        }
        Ok(TransactionGuard)
    }
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        IN_TRANSACTION.with(|flag| flag.set(false));
    }
}

#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` as one serialized transaction.
    pub fn transact<T>(&self, f: impl FnOnce(&mut Engine) -> Result<T, EngineError>) -> Result<T, EngineError> {
        let _guard = TransactionGuard::enter()?;
        let mut engine = self.lock();
        f(&mut engine)
    }

    /// Read-only access under the same exclusion rules.
    pub fn read<T>(&self, f: impl FnOnce(&Engine) -> T) -> Result<T, EngineError> {
        let _guard = TransactionGuard::enter()?;
        let engine = self.lock();
        Ok(f(&engine))
    }

    // a poisoned mutex only means a transaction panicked. its account locks
    // were released by their guards, so the engine stays usable
    fn lock(&self) -> MutexGuard<'_, Engine> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
