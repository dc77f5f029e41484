//! # Method Registry
//!
//! Keyed cache from `MethodId` to its immutable `MethodDescriptor`.
//!
//! Uses DashMap for concurrent registration and lookup without global
//! locking. Each method owns a slot with its own build lock, so building one
//! descriptor never blocks lookups or builds of any other method.
//!
//! ## Invariants
//!
//! - At most one descriptor is ever committed per id, and every caller gets
//!   that same `Arc`.
//! - Under concurrent first access, one caller builds while the others wait
//!   on the slot and then reuse the committed result.
//! - A failed build commits nothing; the next caller builds again.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use dashmap::DashMap;

use crate::descriptor::MethodDescriptor;
use crate::error::Error;
use crate::error::Result;
use crate::method::MethodId;
use crate::method::MethodRecord;

/// A registered method: its record and its `Service.method` name.
#[derive(Debug)]
pub struct MethodEntry {
    pub qualified: String,
    pub record: MethodRecord,
}

struct Slot {
    entry: Arc<MethodEntry>,
    build: Mutex<()>,
    committed: OnceLock<Arc<MethodDescriptor>>,
}

pub struct MethodRegistry {
    slots: DashMap<MethodId, Arc<Slot>>,
    next_id: AtomicU64,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Adds a method and returns its freshly assigned id.
    pub fn register(&self, qualified: String, record: MethodRecord) -> MethodId {
        let id = MethodId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let slot = Slot {
            entry: Arc::new(MethodEntry { qualified, record }),
            build: Mutex::new(()),
            committed: OnceLock::new(),
        };
        self.slots.insert(id, Arc::new(slot));
        id
    }

    /// Removes a method. Its id is never handed out again.
    pub fn remove(&self, id: MethodId) {
        self.slots.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, id: MethodId) -> Result<Arc<Slot>> {
        self.slots
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(Error::UnknownMethod(id))
    }

    pub fn entry(&self, id: MethodId) -> Result<Arc<MethodEntry>> {
        Ok(self.slot(id)?.entry.clone())
    }

    /// The committed descriptor, without building one.
    pub fn get(&self, id: MethodId) -> Option<Arc<MethodDescriptor>> {
        let slot = self.slot(id).ok()?;
        slot.committed.get().cloned()
    }

    /// Returns the descriptor for `id`, building it with `build` on first use.
    pub fn resolve(
        &self,
        id: MethodId,
        build: impl FnOnce(MethodId, &MethodEntry) -> Result<MethodDescriptor>,
    ) -> Result<Arc<MethodDescriptor>> {
        let slot = self.slot(id)?;
        if let Some(descriptor) = slot.committed.get() {
            tracing::trace!(%id, "descriptor cache hit");
            return Ok(descriptor.clone());
        }

        // A panicking build leaves nothing committed, so the lock is still sound.
        let _guard = slot.build.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(descriptor) = slot.committed.get() {
            return Ok(descriptor.clone());
        }

        let descriptor = Arc::new(build(id, &slot.entry)?);
        let committed = slot.committed.get_or_init(|| descriptor);
        tracing::debug!(%id, method = %slot.entry.qualified, variant = ?committed.variant(), "descriptor built");
        Ok(committed.clone())
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
