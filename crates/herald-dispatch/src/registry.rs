//! Append-only rule table shared across the process.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::descriptor::RuleDescriptor;

/// Registered rules in registration order. Registration order is scan order,
/// so earlier rules shadow later ones for messages both would accept.
pub struct RuleRegistry {
    rules: Mutex<Vec<Arc<RuleDescriptor>>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
        }
    }

    /// Appends a rule. Rules are never replaced or removed.
    pub fn register(&self, descriptor: RuleDescriptor) {
        info!("registering rule: {}", descriptor.name);
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(descriptor));
    }

    /// A point-in-time copy of the table. Registrations that land while a
    /// dispatch cycle is underway do not affect that cycle.
    pub fn snapshot(&self) -> Vec<Arc<RuleDescriptor>> {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.rules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
