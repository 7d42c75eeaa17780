//! Engine behind a single lock, for hosts that touch it from several threads.
//!
//! RULE: One writer at a time. Every command runs start to finish under the
//! lock, so no caller ever observes a half-applied command.

use crate::{
    engine::Engine,
    error::{EngineError, EngineResult},
};
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self { inner: Arc::new(Mutex::new(engine)) }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine) -> R) -> EngineResult<R> {
        let mut guard = self.inner.lock().map_err(|_| EngineError::LockPoisoned)?;
        Ok(f(&mut guard))
    }
}
