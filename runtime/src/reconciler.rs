//! Breakpoint set reconciliation.
//!
//! Holds the agent's view of which breakpoints are active and turns each
//! fresh snapshot from the control plane into the delta the engine needs.

use std::collections::{HashMap, HashSet};

use debuglet_core::wire::Breakpoint;
use parking_lot::Mutex;

/// Delta between two consecutive snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileResult {
    /// Breakpoints absent before the call, in snapshot order.
    pub new: Vec<Breakpoint>,
    /// Breakpoints that dropped out of the snapshot, sorted by id.
    pub removed: Vec<Breakpoint>,
}

impl ReconcileResult {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.removed.is_empty()
    }
}

/// The authoritative `id -> Breakpoint` map.
///
/// Every mutation happens inside [`reconcile`](Self::reconcile) under one
/// lock, so readers never see a half-applied snapshot.
#[derive(Default)]
pub struct BreakpointReconciler {
    breakpoints: Mutex<HashMap<String, Breakpoint>>,
}

impl BreakpointReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored set with `active` and report what changed.
    ///
    /// Repeated ids collapse to their first occurrence. Entries present both
    /// before and after keep the stored value.
    pub fn reconcile(&self, active: Vec<Breakpoint>) -> ReconcileResult {
        let mut order = Vec::with_capacity(active.len());
        let mut fresh: HashMap<String, Breakpoint> = HashMap::with_capacity(active.len());
        for breakpoint in active {
            if fresh.contains_key(&breakpoint.id) {
                tracing::debug!(breakpoint_id = %breakpoint.id, "Ignoring duplicate breakpoint in snapshot");
                continue;
            }
            order.push(breakpoint.id.clone());
            fresh.insert(breakpoint.id.clone(), breakpoint);
        }

        let mut stored = self.breakpoints.lock();

        let gone: Vec<String> = stored
            .keys()
            .filter(|id| !fresh.contains_key(*id))
            .cloned()
            .collect();
        let mut removed: Vec<Breakpoint> = gone.iter().filter_map(|id| stored.remove(id)).collect();
        removed.sort_by(|a, b| a.id.cmp(&b.id));

        let mut new = Vec::new();
        for id in order {
            if stored.contains_key(&id) {
                continue;
            }
            if let Some(breakpoint) = fresh.remove(&id) {
                stored.insert(id, breakpoint.clone());
                new.push(breakpoint);
            }
        }

        ReconcileResult { new, removed }
    }

    /// Last known state of a breakpoint.
    pub fn lookup(&self, id: &str) -> Option<Breakpoint> {
        self.breakpoints.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.lock().is_empty()
    }

    /// Ids currently tracked.
    pub fn ids(&self) -> HashSet<String> {
        self.breakpoints.lock().keys().cloned().collect()
    }
}
