//! Per-user answer deadlines.
//!
//! At most one timer is armed per user. Arming replaces (and aborts) the
//! previous timer. A timer that reaches its deadline first *claims* itself by
//! removing its own registry entry; only a claimed timer runs its action, so
//! `cancel` returning `true` means the action will never run. A timer that was
//! already claimed when `cancel` is called can still run its action, which is
//! why actions must re-check session state before mutating anything.

use crate::models::UserId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

struct ArmedTimer {
    id: u64,
    handle: AbortHandle,
}

#[derive(Default)]
pub struct TimeoutSupervisor {
    timers: Mutex<HashMap<UserId, ArmedTimer>>,
    next_id: AtomicU64,
}

impl TimeoutSupervisor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn timers(&self) -> MutexGuard<'_, HashMap<UserId, ArmedTimer>> {
        // Critical sections never panic mid-update, so a poisoned map is still consistent.
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `action` after `deadline` unless cancelled or replaced first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(self: &Arc<Self>, user_id: UserId, deadline: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registry: Weak<Self> = Arc::downgrade(self);

        // Holding the map lock across spawn+insert keeps the task from
        // claiming before its entry exists.
        let mut timers = self.timers();
        let task = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            let Some(registry) = registry.upgrade() else {
                return;
            };
            if !registry.claim(user_id, id) {
                return;
            }
            trace!(user_id, timer_id = id, "answer deadline reached");
            action.await;
        });

        let armed = ArmedTimer {
            id,
            handle: task.abort_handle(),
        };
        if let Some(previous) = timers.insert(user_id, armed) {
            previous.handle.abort();
            debug!(user_id, replaced = previous.id, timer_id = id, "re-armed answer timer");
        } else {
            debug!(user_id, timer_id = id, ?deadline, "armed answer timer");
        }
    }

    /// Disarms the user's timer. Returns whether a not-yet-fired timer was stopped.
    pub fn cancel(&self, user_id: UserId) -> bool {
        match self.timers().remove(&user_id) {
            Some(armed) => {
                armed.handle.abort();
                debug!(user_id, timer_id = armed.id, "cancelled answer timer");
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, user_id: UserId) -> bool {
        self.timers().contains_key(&user_id)
    }

    pub fn armed_count(&self) -> usize {
        self.timers().len()
    }

    /// Cancels every armed timer.
    pub fn shutdown(&self) {
        for (_, armed) in self.timers().drain() {
            armed.handle.abort();
        }
    }

    fn claim(&self, user_id: UserId, id: u64) -> bool {
        let mut timers = self.timers();
        match timers.get(&user_id) {
            Some(armed) if armed.id == id => {
                timers.remove(&user_id);
                true
            }
            _ => false,
        }
    }
}

impl Drop for TimeoutSupervisor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::atomic::AtomicUsize;

    type Action = Pin<Box<dyn Future<Output = ()> + Send>>;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Action) {
        let fired = Arc::new(AtomicUsize::new(0));
        let shared = Arc::clone(&fired);
        let make = move || -> Action {
            let fired = Arc::clone(&shared);
            Box::pin(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            })
        };
        (fired, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_deadline() {
        let supervisor = TimeoutSupervisor::new();
        let (fired, action) = counter();

        supervisor.arm(1, Duration::from_secs(30), action());
        assert!(supervisor.is_armed(1));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!supervisor.is_armed(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_deadline_prevents_firing() {
        let supervisor = TimeoutSupervisor::new();
        let (fired, action) = counter();

        supervisor.arm(1, Duration::from_secs(30), action());
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(supervisor.cancel(1));
        assert!(!supervisor.cancel(1));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_without_timer_is_noop() {
        let supervisor = TimeoutSupervisor::new();
        assert!(!supervisor.cancel(77));
        assert_eq!(supervisor.armed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_timer() {
        let supervisor = TimeoutSupervisor::new();
        let (fired, action) = counter();

        supervisor.arm(1, Duration::from_secs(30), action());
        tokio::time::sleep(Duration::from_secs(20)).await;
        supervisor.arm(1, Duration::from_secs(30), action());
        assert_eq!(supervisor.armed_count(), 1);

        // The first deadline passes without firing.
        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_users_are_independent() {
        let supervisor = TimeoutSupervisor::new();
        let (fired, action) = counter();

        supervisor.arm(1, Duration::from_secs(5), action());
        supervisor.arm(2, Duration::from_secs(5), action());
        assert!(supervisor.cancel(1));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_disarms_everything() {
        let supervisor = TimeoutSupervisor::new();
        let (fired, action) = counter();

        for user in 0..3 {
            supervisor.arm(user, Duration::from_secs(5), action());
        }
        supervisor.shutdown();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(supervisor.armed_count(), 0);
    }
}
