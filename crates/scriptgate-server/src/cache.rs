//! Handler cache.
//!
//! Maps each resolved identifier to the entry point built for it. Entries are
//! created on first use and kept for the life of the process: there is no
//! expiry, no invalidation and no reload when a resource changes on disk.
//!
//! # Single-flight
//!
//! Each identifier owns a `OnceLock` slot. The map lock is only held long
//! enough to fetch or create the slot; the build itself runs inside
//! `OnceLock::get_or_init`, so concurrent first requests for the same
//! identifier block on one build and all receive the same `Arc`. Builds for
//! different identifiers proceed in parallel.
//!
//! A build that panics releases its slot, so the identifier reads as
//! `Unloaded` again and the next request retries.

use scriptgate_common::ScriptId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::handler::EntryPoint;

/// Lifecycle of one identifier in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Never requested.
    Unloaded,
    /// A build is in flight.
    Loading,
    /// Holds a working entry point.
    Loaded,
    /// Holds a dummy handler answering with this status.
    Failed(u16),
}

type Slot = Arc<OnceLock<EntryPoint>>;

/// Process-wide memo of entry points keyed by identifier.
#[derive(Default)]
pub struct HandlerCache {
    slots: Mutex<HashMap<ScriptId, Slot>>,
    builds: AtomicUsize,
}

impl HandlerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry point cached for `id`, running `build` if there is
    /// none yet.
    ///
    /// `build` runs at most once per identifier for the life of the cache,
    /// unless it panics.
    pub fn get_or_build<F>(&self, id: &ScriptId, build: F) -> EntryPoint
    where
        F: FnOnce() -> EntryPoint,
    {
        let slot = self.slot(id);
        slot.get_or_init(|| {
            self.builds.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("Cache miss for {}, building", id);
            let guard = BuildGuard {
                cache: self,
                id,
                slot: &slot,
            };
            let entry = build();
            std::mem::forget(guard);
            entry
        })
        .clone()
    }

    /// Returns the cached entry point for `id` without building.
    pub fn get(&self, id: &ScriptId) -> Option<EntryPoint> {
        self.lock().get(id).and_then(|slot| slot.get().cloned())
    }

    pub fn state(&self, id: &ScriptId) -> CacheState {
        let Some(slot) = self.lock().get(id).cloned() else {
            return CacheState::Unloaded;
        };
        match slot.get() {
            None => CacheState::Loading,
            Some(entry) => match entry.failed_status() {
                Some(status) => CacheState::Failed(status),
                None => CacheState::Loaded,
            },
        }
    }

    /// Number of identifiers holding an entry point.
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of builds started so far.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    fn slot(&self, id: &ScriptId) -> Slot {
        self.lock().entry(id.clone()).or_default().clone()
    }

    // Builds run outside the map lock, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<ScriptId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drops the slot of a build that unwound, returning the identifier to
/// `Unloaded`. Forgotten once the build returns.
struct BuildGuard<'a> {
    cache: &'a HandlerCache,
    id: &'a ScriptId,
    slot: &'a Slot,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.cache.lock();
        if slots.get(self.id).is_some_and(|current| Arc::ptr_eq(current, self.slot)) {
            slots.remove(self.id);
        }
        tracing::warn!("Build for {} panicked, slot released", self.id);
    }
}
