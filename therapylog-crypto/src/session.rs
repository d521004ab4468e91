//! The single-slot holder for the active session key.
//!
//! Populated by unlock, replaced by a committed password change or import,
//! emptied by lock or inactivity. Callers take a scoped clone of the key for
//! one operation and drop it afterwards.

use crate::key::DerivedKey;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Shared handle to the active key. Clones share the same slot.
#[derive(Clone, Default)]
pub struct SessionKeyHolder {
    slot: Arc<RwLock<Option<DerivedKey>>>,
}

impl SessionKeyHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `key`, replacing (and zeroizing) any previous key.
    pub fn set(&self, key: DerivedKey) {
        *self.write() = Some(key);
    }

    /// Drops the active key.
    pub fn clear(&self) {
        *self.write() = None;
    }

    /// A copy of the active key for the duration of one operation.
    pub fn get(&self) -> Option<DerivedKey> {
        self.read().clone()
    }

    pub fn is_unlocked(&self) -> bool {
        self.read().is_some()
    }

    // A poisoned lock only means a panic happened while the slot was held;
    // the Option inside is still coherent.
    fn read(&self) -> RwLockReadGuard<'_, Option<DerivedKey>> {
        self.slot.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<DerivedKey>> {
        self.slot.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for SessionKeyHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyHolder")
            .field("unlocked", &self.is_unlocked())
            .finish()
    }
}
