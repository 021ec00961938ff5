#![cfg(any(test, feature = "test-support"))]

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex};

use super::ReadEnv;

/// Fake environment that never touches the process environment.
///
/// Cloning shares the underlying map, and the map sits behind a `Mutex` so the
/// same instance can be handed to code running on a multi-threaded runtime.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEnv {
    vars: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.vars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ReadEnv for InMemoryEnv {
    fn var(&self, key: &str) -> Result<String, env::VarError> {
        self.lock().get(key).cloned().ok_or(env::VarError::NotPresent)
    }
}
