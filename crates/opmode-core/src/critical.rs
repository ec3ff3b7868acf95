//! Critical operation registry
//!
//! Provides [`CriticalOperationGuard`], the set of operation identifiers
//! exempt from the automatic REAL → DEMO switch.

use std::collections::HashSet;

/// Identifiers of operations that must not be redirected to demo data mid-flight
///
/// Membership is the only observable property.
#[derive(Debug, Default, Clone)]
pub struct CriticalOperationGuard {
    operations: HashSet<String>,
}

impl CriticalOperationGuard {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            operations: HashSet::new(),
        }
    }

    /// Mark operation critical; idempotent
    pub fn mark(&mut self, id: &str) -> bool {
        self.operations.insert(id.to_string())
    }

    /// Unmark operation; absent ids are a no-op
    #[inline]
    pub fn unmark(&mut self, id: &str) -> bool {
        self.operations.remove(id)
    }

    /// Check if operation is critical
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.operations.contains(id)
    }

    /// Sorted copy of all identifiers
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.operations.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of critical operations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
