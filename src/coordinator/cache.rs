//! Snapshot cache
//!
//! Readers clone an `Arc` to an immutable map. A commit builds the next map
//! and swaps the pointer, so a reader never observes a half-applied cycle.

use crate::model::ContractBundle;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Bundles keyed by CUPS
pub type Snapshot = HashMap<String, Arc<ContractBundle>>;

/// Immutable view of the cache at one point in time
pub type SnapshotView = Arc<Snapshot>;

#[derive(Debug, Default)]
pub struct SnapshotCache {
    current: RwLock<SnapshotView>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cups: &str) -> Option<Arc<ContractBundle>> {
        self.view().get(cups).cloned()
    }

    pub fn view(&self) -> SnapshotView {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_empty(&self) -> bool {
        self.view().is_empty()
    }

    /// Replace the given contracts and publish the result as the new view
    ///
    /// Contracts not in `bundles` keep their previous entry.
    pub fn commit(&self, bundles: Vec<ContractBundle>) -> SnapshotView {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next: Snapshot = (**current).clone();
        for bundle in bundles {
            next.insert(bundle.contract.cups.clone(), Arc::new(bundle));
        }
        let view = Arc::new(next);
        *current = Arc::clone(&view);
        view
    }

    /// Publish exactly `bundles` as the new view
    ///
    /// Contracts no longer on the account drop out.
    pub fn replace(&self, bundles: Vec<ContractBundle>) -> SnapshotView {
        let next: Snapshot = bundles
            .into_iter()
            .map(|bundle| (bundle.contract.cups.clone(), Arc::new(bundle)))
            .collect();
        let view = Arc::new(next);
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(&view);
        view
    }
}
