//! Replay guard: an order id can be consumed at most once.
//!
//! Consumption is two-phase. [`ReplayGuard::reserve`] atomically claims an
//! id for an in-flight settlement; any concurrent attempt on the same id
//! fails with [`RelayError::OrderAlreadyFilled`]. The settlement then either
//! commits the [`Reservation`] (the id is appended to the store and becomes
//! permanently consumed) or drops it, which releases the claim.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use relayfill_types::config::ReplayStoreConfig;
use relayfill_types::{OrderId, RelayError, Result};
use tracing::debug;

use crate::store::{FileReplayStore, MemoryReplayStore, ReplayStore};

struct ReplayState {
    /// Ids whose settlement (or cancellation) committed. Never shrinks.
    consumed: HashSet<OrderId>,
    /// Ids reserved by a settlement that has not finished yet.
    in_flight: HashSet<OrderId>,
    store: Box<dyn ReplayStore>,
}

/// Monotone set of consumed order ids, safe to share between threads.
pub struct ReplayGuard {
    state: Mutex<ReplayState>,
}

impl ReplayGuard {
    /// Build a guard over `store`, loading every id it already holds.
    pub fn new(mut store: Box<dyn ReplayStore>) -> Result<Self> {
        let consumed: HashSet<OrderId> = store.load()?.into_iter().collect();
        debug!(consumed = consumed.len(), "Replay guard loaded");
        Ok(Self {
            state: Mutex::new(ReplayState {
                consumed,
                in_flight: HashSet::new(),
                store,
            }),
        })
    }

    /// A guard backed by a [`MemoryReplayStore`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(ReplayState {
                consumed: HashSet::new(),
                in_flight: HashSet::new(),
                store: Box::new(MemoryReplayStore::new()),
            }),
        }
    }

    /// Build the guard selected by configuration.
    pub fn from_config(config: &ReplayStoreConfig) -> Result<Self> {
        match config {
            ReplayStoreConfig::Memory => Ok(Self::in_memory()),
            ReplayStoreConfig::File { path } => Self::new(Box::new(FileReplayStore::open(path)?)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReplayState> {
        // No code path panics while holding the lock with the sets half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `id` for an in-flight settlement.
    ///
    /// # Errors
    /// Returns [`RelayError::OrderAlreadyFilled`] if `id` is consumed or
    /// already reserved.
    pub fn reserve(&self, id: OrderId) -> Result<Reservation<'_>> {
        let mut state = self.lock();
        if state.consumed.contains(&id) || !state.in_flight.insert(id) {
            return Err(RelayError::OrderAlreadyFilled(id));
        }
        Ok(Reservation {
            guard: self,
            id,
            committed: false,
        })
    }

    /// Reserve and immediately commit `id`.
    pub fn consume(&self, id: OrderId) -> Result<()> {
        self.reserve(id)?.commit()
    }

    #[must_use]
    pub fn is_consumed(&self, id: &OrderId) -> bool {
        self.lock().consumed.contains(id)
    }

    /// Whether `id` is held by a settlement in progress.
    #[must_use]
    pub fn is_reserved(&self, id: &OrderId) -> bool {
        self.lock().in_flight.contains(id)
    }

    /// Number of consumed ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().consumed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().consumed.is_empty()
    }

    fn finish(&self, id: OrderId) -> Result<()> {
        let mut state = self.lock();
        state.store.append(id)?;
        state.in_flight.remove(&id);
        state.consumed.insert(id);
        Ok(())
    }

    fn release(&self, id: OrderId) {
        self.lock().in_flight.remove(&id);
    }
}

/// An id claimed by one settlement attempt. Released on drop unless
/// committed.
#[must_use = "an uncommitted reservation is released when dropped"]
pub struct Reservation<'a> {
    guard: &'a ReplayGuard,
    id: OrderId,
    committed: bool,
}

impl Reservation<'_> {
    #[must_use]
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Make the consumption permanent.
    ///
    /// # Errors
    /// Returns the store's error if the id could not be persisted; the
    /// reservation is then released.
    pub fn commit(mut self) -> Result<()> {
        self.guard.finish(self.id)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.guard.release(self.id);
        }
    }
}
