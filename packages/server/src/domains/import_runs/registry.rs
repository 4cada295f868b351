//! Live cancel handles for import runs driven by this process.
//!
//! The lock guards map access only and is never held across an await.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::common::ImportRunId;

#[derive(Clone, Default)]
pub struct RunRegistry {
    active: Arc<Mutex<HashMap<ImportRunId, CancellationToken>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh cancel handle for `run_id`. Returns `None` when a
    /// task for that run is already live. Dropping the guard deregisters.
    pub fn register(&self, run_id: ImportRunId) -> Option<RunHandle> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.contains_key(&run_id) {
            return None;
        }
        let token = CancellationToken::new();
        active.insert(run_id, token.clone());
        Some(RunHandle {
            run_id,
            token,
            registry: self.clone(),
        })
    }

    /// Signal the run's context. False when nothing is live for `run_id`.
    pub fn cancel(&self, run_id: ImportRunId) -> bool {
        let token = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&run_id)
            .cloned();
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, run_id: ImportRunId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&run_id)
    }

    pub fn active_ids(&self) -> Vec<ImportRunId> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    fn remove(&self, run_id: ImportRunId) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&run_id);
    }
}

/// Registration of one live run; removes itself from the registry on drop.
pub struct RunHandle {
    run_id: ImportRunId,
    token: CancellationToken,
    registry: RunRegistry,
}

impl RunHandle {
    pub fn run_id(&self) -> ImportRunId {
        self.run_id
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.token.cancel();
        self.registry.remove(self.run_id);
    }
}
