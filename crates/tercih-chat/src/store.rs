//! Session storage.
//!
//! Read-modify-write sequences on one session are serialized by a per-session
//! lock; sessions never wait on each other. The map lock is only held for
//! lookups, and always taken before a session lock, never after.
//!
//! The expiry sweep only removes sessions whose lock it can take without
//! waiting, and marks them retired before removal. An operation that found
//! the session before the sweep and locks it afterwards sees the flag and
//! starts over, so it never mutates a session that is no longer stored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, TryLockError};

use tracing::{info, warn};

use crate::error::ChatError;
use crate::types::SessionContext;

/// Keyed session storage with per-key serialization.
pub trait SessionStore: Send + Sync {
    /// Run `f` on the session, creating it with `create` if it does not exist.
    fn update_or_create(
        &self,
        session_id: &str,
        create: &dyn Fn() -> SessionContext,
        f: &mut dyn FnMut(&mut SessionContext) -> Result<(), ChatError>,
    ) -> Result<(), ChatError>;

    /// Run `f` on an existing session. A missing session is logged and
    /// skipped; returns whether `f` ran.
    fn modify_existing(
        &self,
        session_id: &str,
        f: &mut dyn FnMut(&mut SessionContext) -> Result<(), ChatError>,
    ) -> Result<bool, ChatError>;

    /// Copy of the session, if present.
    fn get(&self, session_id: &str) -> Result<Option<SessionContext>, ChatError>;

    /// Remove a session; returns whether it existed.
    fn clear(&self, session_id: &str) -> Result<bool, ChatError>;

    /// Remove sessions idle for more than `idle_secs` at `now` (epoch
    /// seconds); returns how many were removed.
    fn sweep_expired(&self, idle_secs: i64, now: i64) -> Result<usize, ChatError>;

    fn len(&self) -> Result<usize, ChatError>;

    fn is_empty(&self) -> Result<bool, ChatError> {
        Ok(self.len()? == 0)
    }
}

// =============================================================================
// InMemorySessionStore
// =============================================================================

struct SessionSlot {
    context: SessionContext,
    /// Set once the slot has been removed from the map.
    retired: bool,
}

type SharedSlot = Arc<Mutex<SessionSlot>>;

/// Process-local session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SharedSlot>>,
}

fn poisoned<E: std::fmt::Display>(what: &str) -> impl FnOnce(E) -> ChatError + '_ {
    move |e| ChatError::Internal(format!("{} lock poisoned: {}", what, e))
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(
        &self,
        session_id: &str,
        create: Option<&dyn Fn() -> SessionContext>,
    ) -> Result<Option<SharedSlot>, ChatError> {
        let mut sessions = self.sessions.lock().map_err(poisoned("session map"))?;
        if let Some(slot) = sessions.get(session_id) {
            return Ok(Some(Arc::clone(slot)));
        }
        Ok(create.map(|create| {
            let slot = Arc::new(Mutex::new(SessionSlot {
                context: create(),
                retired: false,
            }));
            sessions.insert(session_id.to_string(), Arc::clone(&slot));
            slot
        }))
    }

    /// Lock the live slot for `session_id` and run `f` on it.
    fn run_locked(
        &self,
        session_id: &str,
        create: Option<&dyn Fn() -> SessionContext>,
        f: &mut dyn FnMut(&mut SessionContext) -> Result<(), ChatError>,
    ) -> Result<bool, ChatError> {
        loop {
            let Some(slot) = self.lookup(session_id, create)? else {
                return Ok(false);
            };
            let mut guard = slot.lock().map_err(poisoned("session"))?;
            if guard.retired {
                // Swept or cleared after the lookup; look again.
                continue;
            }
            f(&mut guard.context)?;
            return Ok(true);
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn update_or_create(
        &self,
        session_id: &str,
        create: &dyn Fn() -> SessionContext,
        f: &mut dyn FnMut(&mut SessionContext) -> Result<(), ChatError>,
    ) -> Result<(), ChatError> {
        self.run_locked(session_id, Some(create), f).map(|_| ())
    }

    fn modify_existing(
        &self,
        session_id: &str,
        f: &mut dyn FnMut(&mut SessionContext) -> Result<(), ChatError>,
    ) -> Result<bool, ChatError> {
        let ran = self.run_locked(session_id, None, f)?;
        if !ran {
            warn!("Tried to modify missing session {}; ignoring", session_id);
        }
        Ok(ran)
    }

    fn get(&self, session_id: &str) -> Result<Option<SessionContext>, ChatError> {
        let mut copy = None;
        self.run_locked(session_id, None, &mut |ctx| {
            copy = Some(ctx.clone());
            Ok(())
        })?;
        Ok(copy)
    }

    fn clear(&self, session_id: &str) -> Result<bool, ChatError> {
        let removed = self
            .sessions
            .lock()
            .map_err(poisoned("session map"))?
            .remove(session_id);
        let Some(slot) = removed else {
            return Ok(false);
        };
        // Map guard is gone; a turn holding this session only delays us.
        match slot.lock() {
            Ok(mut guard) => guard.retired = true,
            Err(e) => e.into_inner().retired = true,
        }
        Ok(true)
    }

    fn sweep_expired(&self, idle_secs: i64, now: i64) -> Result<usize, ChatError> {
        let mut sessions = self.sessions.lock().map_err(poisoned("session map"))?;
        let before = sessions.len();
        sessions.retain(|_, slot| match slot.try_lock() {
            Ok(mut guard) => {
                if now - guard.context.last_activity > idle_secs {
                    guard.retired = true;
                    false
                } else {
                    true
                }
            }
            // In use by a turn right now, so not idle.
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Poisoned(e)) => {
                e.into_inner().retired = true;
                false
            }
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(
                "Session sweep removed {} idle sessions, {} remain",
                removed,
                sessions.len()
            );
        }
        Ok(removed)
    }

    fn len(&self) -> Result<usize, ChatError> {
        Ok(self.sessions.lock().map_err(poisoned("session map"))?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ConversationManager;
    use std::thread;

    fn creator(id: &str) -> impl Fn() -> SessionContext + '_ {
        move || ConversationManager::default().create_session(id, "u")
    }

    fn bump(store: &InMemorySessionStore, id: &str) {
        store
            .update_or_create(id, &creator(id), &mut |ctx| {
                ctx.turn_count += 1;
                Ok(())
            })
            .unwrap();
    }

    // ---- basic operations ----

    #[test]
    fn test_update_or_create_creates_once() {
        let store = InMemorySessionStore::new();
        bump(&store, "a");
        bump(&store, "a");
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get("a").unwrap().unwrap().turn_count, 2);
    }

    #[test]
    fn test_modify_missing_is_noop() {
        let store = InMemorySessionStore::new();
        let ran = store
            .modify_existing("ghost", &mut |ctx| {
                ctx.turn_count = 99;
                Ok(())
            })
            .unwrap();
        assert!(!ran);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_closure_error_propagates() {
        let store = InMemorySessionStore::new();
        let err = store
            .update_or_create("a", &creator("a"), &mut |_| {
                Err(ChatError::Internal("boom".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, ChatError::Internal(_)));
    }

    #[test]
    fn test_clear() {
        let store = InMemorySessionStore::new();
        bump(&store, "a");
        assert!(store.clear("a").unwrap());
        assert!(!store.clear("a").unwrap());
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    fn test_clear_waiting_on_busy_session_leaves_map_usable() {
        let store = InMemorySessionStore::new();
        thread::scope(|scope| {
            store
                .update_or_create("busy", &creator("busy"), &mut |_| {
                    let clearer = scope.spawn(|| store.clear("busy").unwrap());
                    // Give the clear time to block on this session.
                    thread::sleep(std::time::Duration::from_millis(50));
                    bump(&store, "other");
                    assert!(!clearer.is_finished());
                    Ok(())
                })
                .unwrap();
        });
        assert!(store.get("busy").unwrap().is_none());
        assert_eq!(store.get("other").unwrap().unwrap().turn_count, 1);
    }

    // ---- sweep ----

    #[test]
    fn test_sweep_removes_idle_keeps_recent() {
        let store = InMemorySessionStore::new();
        for (id, last) in [("old", 1_000), ("fresh", 2_700)] {
            store
                .update_or_create(id, &creator(id), &mut |ctx| {
                    ctx.last_activity = last;
                    Ok(())
                })
                .unwrap();
        }
        let removed = store.sweep_expired(30 * 60, 3_000).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("old").unwrap().is_none());
        assert!(store.get("fresh").unwrap().is_some());
    }

    #[test]
    fn test_sweep_skips_session_in_use() {
        let store = InMemorySessionStore::new();
        store
            .update_or_create("busy", &creator("busy"), &mut |ctx| {
                ctx.last_activity = 0;
                // The sweep runs while this turn holds the session.
                let removed = store.sweep_expired(1, 10_000).unwrap();
                assert_eq!(removed, 0);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.len().unwrap(), 1);
    }

    // ---- concurrency ----

    #[test]
    fn test_concurrent_updates_same_session_not_lost() {
        let store = Arc::new(InMemorySessionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..50 {
                        bump(&store, "shared");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get("shared").unwrap().unwrap().turn_count, 400);
    }

    #[test]
    fn test_concurrent_sweep_and_updates() {
        let store = Arc::new(InMemorySessionStore::new());
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let id = format!("s-{}", i);
                    for _ in 0..100 {
                        bump(&store, &id);
                    }
                })
            })
            .collect();
        let sweeper = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..100 {
                    // Nothing is idle relative to the creation time.
                    store.sweep_expired(3_600, 0).unwrap();
                }
            })
        };
        for h in writers {
            h.join().unwrap();
        }
        sweeper.join().unwrap();
        for i in 0..4 {
            let ctx = store.get(&format!("s-{}", i)).unwrap().unwrap();
            assert_eq!(ctx.turn_count, 100);
        }
    }
}
