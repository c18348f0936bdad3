//! Progress aggregator - turns completion events into global progress
//!
//! All accounting lives behind one lock. An `apply` call checks the whole
//! completion cascade first and only then writes, so a rejected event leaves
//! nothing behind.

use super::events::ProgressEvent;
use super::tree::{AllocationId, AllocationTree};
use crate::errors::ProgressError;
use crate::ui::DisplayHandle;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Lifecycle of a single allocation, strictly forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationState {
    /// Never reported
    Unseen,
    /// Reported with zero units only
    Registered,
    Partial,
    Complete,
}

/// Read-only view of one allocation's accounting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationStatus {
    pub path: String,
    pub description: String,
    pub completed: u64,
    pub total: u64,
    pub state: AllocationState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub progress: f64,
    pub allocations: Vec<AllocationStatus>,
}

#[derive(Debug, Default)]
struct Accounting {
    completed: HashMap<AllocationId, u64>,
    progress: f64,
}

impl Accounting {
    fn completed(&self, id: AllocationId) -> u64 {
        self.completed.get(&id).copied().unwrap_or(0)
    }

    /// Walk the completion cascade started by `units` on `allocation` and
    /// return every count it would write, without writing any.
    fn plan(
        &self,
        tree: &AllocationTree,
        allocation: AllocationId,
        units: u64,
    ) -> Result<Vec<(AllocationId, u64)>, ProgressError> {
        let mut updates = Vec::new();
        let mut current = allocation;
        let mut increment = units;

        loop {
            let node = tree
                .get(current)
                .ok_or(ProgressError::UnknownAllocation(current))?;
            let completed = self.completed(current);
            let attempted = match completed.checked_add(increment) {
                Some(attempted) if attempted <= node.total_units => attempted,
                _ => {
                    return Err(ProgressError::Overflow {
                        description: node.description.clone(),
                        attempted: u128::from(completed) + u128::from(increment),
                        total: node.total_units,
                    })
                }
            };
            updates.push((current, attempted));

            if attempted < node.total_units {
                break;
            }
            match node.parent {
                Some(parent) => {
                    log::trace!(
                        "'{}' complete, crediting one unit to {}",
                        node.description,
                        parent
                    );
                    current = parent;
                    increment = 1;
                }
                None => break,
            }
        }

        Ok(updates)
    }
}

/// Sole owner of the completion map and global progress for one tree
pub struct ProgressAggregator {
    tree: Arc<AllocationTree>,
    accounting: Mutex<Accounting>,
    display: Option<DisplayHandle>,
}

impl ProgressAggregator {
    pub fn new(tree: Arc<AllocationTree>) -> Self {
        Self {
            tree,
            accounting: Mutex::new(Accounting::default()),
            display: None,
        }
    }

    /// Hand every progress change to a display worker
    pub fn with_display(mut self, display: DisplayHandle) -> Self {
        self.display = Some(display);
        self
    }

    pub fn tree(&self) -> &Arc<AllocationTree> {
        &self.tree
    }

    // Accounting is only written after every check passed, so a guard left
    // behind by a panicking holder is still consistent.
    fn lock(&self) -> MutexGuard<'_, Accounting> {
        self.accounting.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `units` newly completed units of `allocation`.
    ///
    /// Completing an allocation credits one unit to its parent, cascading
    /// upward through every ancestor that is exhausted by it. Only the direct
    /// event moves global progress. Returns the new global progress.
    pub fn apply(&self, allocation: AllocationId, units: u64) -> Result<f64, ProgressError> {
        let node = self
            .tree
            .get(allocation)
            .ok_or(ProgressError::UnknownAllocation(allocation))?;

        let mut accounting = self.lock();

        if units == 0 {
            accounting.completed.entry(allocation).or_insert(0);
            return Ok(accounting.progress);
        }

        let updates = accounting.plan(&self.tree, allocation, units)?;
        for (id, completed) in updates {
            accounting.completed.insert(id, completed);
        }
        accounting.progress += units as f64 * node.fraction_of_root / node.total_units as f64;

        let progress = accounting.progress;
        log::debug!(
            "'{}' +{} units, progress {:.4}",
            node.description,
            units,
            progress
        );

        if let Some(display) = &self.display {
            display.display(progress);
        }

        Ok(progress)
    }

    pub fn accept(&self, event: ProgressEvent) -> Result<f64, ProgressError> {
        self.apply(event.allocation, event.units)
    }

    pub fn progress(&self) -> f64 {
        self.lock().progress
    }

    pub fn completed(&self, allocation: AllocationId) -> u64 {
        self.lock().completed(allocation)
    }

    pub fn state(&self, allocation: AllocationId) -> AllocationState {
        let accounting = self.lock();
        self.state_of(&accounting, allocation)
    }

    fn state_of(&self, accounting: &Accounting, allocation: AllocationId) -> AllocationState {
        let (Some(node), Some(&completed)) = (
            self.tree.get(allocation),
            accounting.completed.get(&allocation),
        ) else {
            return AllocationState::Unseen;
        };

        if completed == 0 {
            AllocationState::Registered
        } else if completed < node.total_units {
            AllocationState::Partial
        } else {
            AllocationState::Complete
        }
    }

    /// True once the root itself has been exhausted
    pub fn is_complete(&self) -> bool {
        self.state(self.tree.root()) == AllocationState::Complete
    }

    /// Descriptions of allocations that have been seen but are not complete
    pub fn unfinished(&self) -> Vec<String> {
        let accounting = self.lock();
        self.tree
            .ids()
            .filter(|id| {
                matches!(
                    self.state_of(&accounting, *id),
                    AllocationState::Registered | AllocationState::Partial
                )
            })
            .filter_map(|id| self.tree.get(id))
            .map(|node| node.description.clone())
            .collect()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let accounting = self.lock();
        let allocations = self
            .tree
            .ids()
            .filter(|id| accounting.completed.contains_key(id))
            .filter_map(|id| {
                let node = self.tree.get(id)?;
                Some(AllocationStatus {
                    path: self.tree.path_of(id)?,
                    description: node.description.clone(),
                    completed: accounting.completed(id),
                    total: node.total_units,
                    state: self.state_of(&accounting, id),
                })
            })
            .collect();

        ProgressSnapshot {
            progress: accounting.progress,
            allocations,
        }
    }
}
