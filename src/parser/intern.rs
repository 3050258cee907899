//! String interning for high-repetition packet columns
//!
//! A capture with millions of packets usually has only a few thousand distinct
//! addresses and a few dozen protocol labels. Each pool hands out one canonical
//! `Arc<str>` per distinct value so records share storage.
//!
//! Addresses and protocol labels are pooled separately: address cardinality
//! grows with the capture while protocol labels saturate almost immediately.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// A single insert-or-fetch string pool
#[derive(Debug, Default)]
pub struct InternPool {
    strings: RwLock<HashSet<Arc<str>>>,
}

impl InternPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical instance for `value`, inserting it if new
    ///
    /// Lookups take the read lock only; the write lock is taken on a miss and
    /// the set is checked again so two racing callers still agree on one
    /// instance.
    pub fn intern(&self, value: &str) -> Arc<str> {
        {
            let strings = self.strings.read().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = strings.get(value) {
                return Arc::clone(existing);
            }
        }

        let mut strings = self.strings.write().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = strings.get(value) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(value);
        strings.insert(Arc::clone(&interned));
        interned
    }

    /// Number of distinct values held
    pub fn len(&self) -> usize {
        self.strings.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pooled value
    ///
    /// Handles already given out stay valid; they just stop being canonical.
    pub fn clear(&self) {
        self.strings
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// The pools used by one analysis run
#[derive(Debug, Default)]
pub struct StringInterner {
    addresses: InternPool,
    protocols: InternPool,
}

impl StringInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern an IPv4/IPv6 address string
    pub fn address(&self, value: &str) -> Arc<str> {
        self.addresses.intern(value)
    }

    /// Intern a protocol label
    pub fn protocol(&self, value: &str) -> Arc<str> {
        self.protocols.intern(value)
    }

    pub fn address_pool(&self) -> &InternPool {
        &self.addresses
    }

    pub fn protocol_pool(&self) -> &InternPool {
        &self.protocols
    }

    /// Empty both pools
    pub fn clear(&self) {
        self.addresses.clear();
        self.protocols.clear();
    }

    /// Distinct (addresses, protocols) currently pooled
    pub fn stats(&self) -> (usize, usize) {
        (self.addresses.len(), self.protocols.len())
    }
}
