//! Per-package admission gates
//!
//! One gate per package name, capacity one. Every entity handed the same
//! coordinator shares the gate, so two entities pointed at the same
//! directory never run their external builds at the same time.

use crate::error::{PrebuildError, PrebuildResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// Registry of admission gates keyed by package name
#[derive(Debug, Default)]
pub struct BuildCoordinator {
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl BuildCoordinator {
    /// Create an empty coordinator
    pub fn new() -> Self {
        Self::default()
    }

    /// The gate for `package`, created on first use
    fn gate(&self, package: &str) -> Arc<Semaphore> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates
            .entry(package.to_string())
            .or_insert_with(|| {
                debug!("Creating build gate for {}", package);
                Arc::new(Semaphore::new(1))
            })
            .clone()
    }

    /// Wait until `package` may build; the returned permit is the admission
    pub async fn admit(&self, package: &str) -> PrebuildResult<OwnedSemaphorePermit> {
        self.gate(package)
            .acquire_owned()
            .await
            .map_err(|_| PrebuildError::Internal(format!("build gate for {} closed", package)))
    }

    /// Whether a build for `package` currently holds the gate
    pub fn is_busy(&self, package: &str) -> bool {
        let gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates
            .get(package)
            .is_some_and(|gate| gate.available_permits() == 0)
    }

    /// Number of packages with a gate
    pub fn len(&self) -> usize {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no gate has been created yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
