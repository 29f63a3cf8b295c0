//! Per-user session slots.
//!
//! Each user owns one slot guarded by its own async mutex. Holding a
//! [`SessionSlot`] is what serializes a user's transitions: answers, skips and
//! timer firings all go through [`SessionStore::lock`] first. Different users
//! never contend beyond the brief lookup in the slot map. A slot that is left
//! empty is pruned from the map when its guard drops.

use super::MessageRef;
use crate::models::{SessionState, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// A running session plus where its messages go.
#[derive(Clone, Debug)]
pub struct ActiveSession {
    pub state: SessionState,
    pub target: MessageRef,
}

type Slot = Arc<AsyncMutex<Option<ActiveSession>>>;
type SlotMap = Arc<Mutex<HashMap<UserId, Slot>>>;

fn lock_map(slots: &SlotMap) -> MutexGuard<'_, HashMap<UserId, Slot>> {
    slots.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Default)]
pub struct SessionStore {
    slots: SlotMap,
}

/// Exclusive access to one user's session for the lifetime of the guard.
pub struct SessionSlot {
    user_id: UserId,
    slots: SlotMap,
    guard: OwnedMutexGuard<Option<ActiveSession>>,
}

impl SessionSlot {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn load(&self) -> Option<&ActiveSession> {
        self.guard.as_ref()
    }

    pub fn load_mut(&mut self) -> Option<&mut ActiveSession> {
        self.guard.as_mut()
    }

    pub fn save(&mut self, session: ActiveSession) -> Option<ActiveSession> {
        self.guard.replace(session)
    }

    pub fn clear(&mut self) -> Option<ActiveSession> {
        self.guard.take()
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        if self.guard.is_some() {
            return;
        }
        // Only the map and this guard reference the slot, so nobody is
        // waiting on it. New waiters have to go through the map lock first.
        let mut slots = lock_map(&self.slots);
        let idle = slots.get(&self.user_id).is_some_and(|slot| {
            Arc::ptr_eq(slot, OwnedMutexGuard::mutex(&self.guard)) && Arc::strong_count(slot) == 2
        });
        if idle {
            slots.remove(&self.user_id);
        }
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `user_id`'s session.
    pub async fn lock(&self, user_id: UserId) -> SessionSlot {
        let slot = Arc::clone(lock_map(&self.slots).entry(user_id).or_default());
        SessionSlot {
            user_id,
            slots: Arc::clone(&self.slots),
            guard: slot.lock_owned().await,
        }
    }

    /// Number of users that currently have a slot, active or not.
    pub fn slot_count(&self) -> usize {
        lock_map(&self.slots).len()
    }
}
