//! Fixed-capacity container slot table.
//!
//! The registry owns every `ContainerRecord` and hands out stable integer
//! slot indices as container ids. Two locks guard each slot: a `std` RwLock
//! over the record for snapshot reads and commits, and a tokio Mutex that
//! serializes lifecycle transitions. The transition guard may be held across
//! engine calls; the record lock never is.

use std::sync::{Mutex, RwLock};

use tokio::sync::Mutex as TransitionMutex;
use tokio::sync::MutexGuard as TransitionGuard;

use crate::error::{ContainerError, Result};
use crate::state::{ContainerId, ContainerRecord, ContainerStatus, ContainerSummary};

enum SlotState {
    Free,
    Occupied(ContainerRecord),
}

struct Slot {
    /// Serializes lifecycle transitions on this slot.
    transition: TransitionMutex<()>,
    /// Record state; held only briefly, never across an await.
    record: RwLock<SlotState>,
}

impl Slot {
    fn new() -> Self {
        Self {
            transition: TransitionMutex::new(()),
            record: RwLock::new(SlotState::Free),
        }
    }
}

/// Fixed-size table of container slots.
pub struct Registry {
    slots: Vec<Slot>,
    /// Serializes slot allocation so the free-slot scan and the uniqueness
    /// check are atomic. Held only for index bookkeeping.
    alloc: Mutex<()>,
}

impl Registry {
    /// Creates a registry with `capacity` empty slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| Slot::new()).collect(),
            alloc: Mutex::new(()),
        }
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of currently occupied slots.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.occupied_ids().count()
    }

    /// Places a record into the first free slot and returns its id.
    ///
    /// Fails with [`ContainerError::Full`] when no slot is free and with
    /// [`ContainerError::DuplicateName`] when another live container already
    /// uses the record's name.
    pub fn allocate(&self, record: ContainerRecord) -> Result<ContainerId> {
        let _alloc = self
            .alloc
            .lock()
            .map_err(|_| ContainerError::Runtime("lock poisoned".to_string()))?;

        let mut free = None;
        for (id, slot) in self.slots.iter().enumerate() {
            let state = slot
                .record
                .read()
                .map_err(|_| ContainerError::Runtime("lock poisoned".to_string()))?;
            match &*state {
                SlotState::Occupied(existing) => {
                    if existing.identity.name == record.identity.name {
                        return Err(ContainerError::DuplicateName(record.identity.name.clone()));
                    }
                }
                SlotState::Free => {
                    if free.is_none() {
                        free = Some(id);
                    }
                }
            }
        }

        let Some(id) = free else {
            return Err(ContainerError::Full {
                capacity: self.slots.len(),
            });
        };

        let mut state = self.slots[id]
            .record
            .write()
            .map_err(|_| ContainerError::Runtime("lock poisoned".to_string()))?;
        *state = SlotState::Occupied(record);
        Ok(id)
    }

    /// Acquires the transition guard for a slot, serializing lifecycle
    /// operations against it. Fails for out-of-range ids; the slot itself
    /// may be free (destroy treats that as an idempotent no-op).
    pub async fn lock_transition(&self, id: ContainerId) -> Result<TransitionGuard<'_, ()>> {
        let slot = self.slots.get(id).ok_or(ContainerError::InvalidId(id))?;
        Ok(slot.transition.lock().await)
    }

    /// Snapshot of a slot's status. `Unknown` for out-of-range ids and free
    /// slots; tolerant of being one transition stale.
    #[must_use]
    pub fn status(&self, id: ContainerId) -> ContainerStatus {
        let Some(slot) = self.slots.get(id) else {
            return ContainerStatus::Unknown;
        };
        match slot.record.read() {
            Ok(state) => match &*state {
                SlotState::Occupied(record) => record.status,
                SlotState::Free => ContainerStatus::Unknown,
            },
            Err(_) => ContainerStatus::Unknown,
        }
    }

    /// Runs a closure over the slot's record under the read lock.
    pub fn with_record<R>(
        &self,
        id: ContainerId,
        f: impl FnOnce(&ContainerRecord) -> R,
    ) -> Result<R> {
        let slot = self.slots.get(id).ok_or(ContainerError::InvalidId(id))?;
        let state = slot
            .record
            .read()
            .map_err(|_| ContainerError::Runtime("lock poisoned".to_string()))?;
        match &*state {
            SlotState::Occupied(record) => Ok(f(record)),
            SlotState::Free => Err(ContainerError::InvalidId(id)),
        }
    }

    /// Runs a closure over the slot's record under the write lock.
    pub fn update<R>(
        &self,
        id: ContainerId,
        f: impl FnOnce(&mut ContainerRecord) -> R,
    ) -> Result<R> {
        let slot = self.slots.get(id).ok_or(ContainerError::InvalidId(id))?;
        let mut state = slot
            .record
            .write()
            .map_err(|_| ContainerError::Runtime("lock poisoned".to_string()))?;
        match &mut *state {
            SlotState::Occupied(record) => Ok(f(record)),
            SlotState::Free => Err(ContainerError::InvalidId(id)),
        }
    }

    /// Frees a slot and returns its record so the caller can release engine
    /// handles without holding the record lock.
    pub fn clear(&self, id: ContainerId) -> Result<ContainerRecord> {
        let slot = self.slots.get(id).ok_or(ContainerError::InvalidId(id))?;
        let mut state = slot
            .record
            .write()
            .map_err(|_| ContainerError::Runtime("lock poisoned".to_string()))?;
        match std::mem::replace(&mut *state, SlotState::Free) {
            SlotState::Occupied(record) => Ok(record),
            SlotState::Free => Err(ContainerError::InvalidId(id)),
        }
    }

    /// Lazy, restartable enumeration of currently occupied slot ids, for
    /// status and health sweeps.
    pub fn occupied_ids(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.slots.iter().enumerate().filter_map(|(id, slot)| {
            match slot.record.read() {
                Ok(state) => matches!(&*state, SlotState::Occupied(_)).then_some(id),
                Err(_) => None,
            }
        })
    }

    /// Snapshots all occupied slots.
    #[must_use]
    pub fn summaries(&self) -> Vec<ContainerSummary> {
        self.occupied_ids()
            .filter_map(|id| {
                self.with_record(id, |record| ContainerSummary {
                    id,
                    name: record.identity.name.clone(),
                    content_digest: record.identity.content_digest.clone(),
                    status: record.status,
                })
                .ok()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ContainerIdentity, ContainerLimits, HealthCheckConfig};
    use bytes::Bytes;

    fn record(name: &str) -> ContainerRecord {
        let digest = "b".repeat(64);
        ContainerRecord::new(
            ContainerIdentity::new(name, &digest).unwrap(),
            ContainerLimits::new(4096, 8192),
            HealthCheckConfig::default(),
            Bytes::from_static(b"\0mod"),
        )
    }

    #[test]
    fn allocates_first_free_slot() {
        let registry = Registry::new(2);
        assert_eq!(registry.allocate(record("a")).unwrap(), 0);
        assert_eq!(registry.allocate(record("b")).unwrap(), 1);
        assert_eq!(registry.live_count(), 2);
    }

    #[test]
    fn rejects_duplicate_names() {
        let registry = Registry::new(2);
        registry.allocate(record("a")).unwrap();
        assert!(matches!(
            registry.allocate(record("a")),
            Err(ContainerError::DuplicateName(_))
        ));
    }

    #[test]
    fn full_registry_rejects_allocation_without_side_effects() {
        let registry = Registry::new(1);
        registry.allocate(record("a")).unwrap();
        assert!(matches!(
            registry.allocate(record("b")),
            Err(ContainerError::Full { capacity: 1 })
        ));
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn cleared_slot_is_reused_and_name_freed() {
        let registry = Registry::new(2);
        registry.allocate(record("a")).unwrap();
        registry.allocate(record("b")).unwrap();

        registry.clear(0).unwrap();
        assert_eq!(registry.status(0), ContainerStatus::Unknown);

        // Freed slot index and name are both reusable.
        assert_eq!(registry.allocate(record("a")).unwrap(), 0);
    }

    #[test]
    fn status_is_unknown_for_invalid_ids() {
        let registry = Registry::new(1);
        assert_eq!(registry.status(0), ContainerStatus::Unknown);
        assert_eq!(registry.status(99), ContainerStatus::Unknown);
    }

    #[test]
    fn enumeration_skips_free_slots() {
        let registry = Registry::new(3);
        registry.allocate(record("a")).unwrap();
        registry.allocate(record("b")).unwrap();
        registry.clear(0).unwrap();

        let ids: Vec<_> = registry.occupied_ids().collect();
        assert_eq!(ids, vec![1]);
    }
}
