//! Descriptor interning
//!
//! Structurally equal expressions resolve to the same shared descriptor, so
//! programs that generate signatures dynamically do not grow without bound.

use std::sync::Arc;

use dashmap::DashMap;

use super::descriptor::TypeDescriptor;
use super::expr::TypeExpr;
use crate::logging::log_descriptor_interned;
use crate::stats;

/// Concurrent expression → descriptor cache
#[derive(Default)]
pub struct DescriptorCache {
    entries: DashMap<TypeExpr, Arc<TypeDescriptor>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, expr: &TypeExpr) -> Option<Arc<TypeDescriptor>> {
        self.entries.get(expr).map(|entry| Arc::clone(entry.value()))
    }

    /// Publish fully resolved descriptors
    ///
    /// An entry that raced in first wins; callers keep whichever `Arc` they
    /// already hold, which is structurally identical.
    pub fn commit(&self, resolved: Vec<(TypeExpr, Arc<TypeDescriptor>)>) {
        for (expr, descriptor) in resolved {
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.entries.entry(expr) {
                log_descriptor_interned(&slot.key().to_string(), descriptor.size());
                slot.insert(descriptor);
                stats::record_descriptor_interned();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
