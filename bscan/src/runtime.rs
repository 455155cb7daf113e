//! Runtime store.
//!
//! An explicit record rather than a shared mutable mapping: the supervisor
//! plus the one truly shared mutable collection (the active-targets set),
//! both guarded by `parking_lot::Mutex`.

use std::collections::HashSet;

use bscan_core::BscanError;
use parking_lot::Mutex;

use crate::supervisor::Supervisor;

/// A snapshot of process-wide progress; never stored, only computed on
/// demand for the status reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStats {
    pub active_targets: usize,
    pub total_subprocs: usize,
}

/// Shared state reachable from every in-flight pipeline.
pub struct Runtime {
    pub supervisor: Supervisor,
    active_targets: Mutex<HashSet<String>>,
}

impl Runtime {
    pub fn new(supervisor: Supervisor) -> Self {
        Self {
            supervisor,
            active_targets: Mutex::new(HashSet::new()),
        }
    }

    /// Admits `target` into the active set. Fails internally if it is
    /// already present.
    pub fn admit(&self, target: &str) -> Result<(), BscanError> {
        let mut active = self.active_targets.lock();
        if !active.insert(target.to_string()) {
            return Err(BscanError::Internal(format!(
                "target `{target}` admitted twice"
            )));
        }
        Ok(())
    }

    /// Removes `target` from the active set once its pipeline retires.
    pub fn retire(&self, target: &str) {
        self.active_targets.lock().remove(target);
    }

    pub fn is_active(&self, target: &str) -> bool {
        self.active_targets.lock().contains(target)
    }

    pub fn active_target_count(&self) -> usize {
        self.active_targets.lock().len()
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            active_targets: self.active_target_count(),
            total_subprocs: self.supervisor.running_count(),
        }
    }
}
