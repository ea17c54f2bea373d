//! Concurrent session table.
//!
//! The registry lock guards only the map and is never held across an
//! analyzer call or an `.await`. Each session carries its own async lock
//! around its analyzer; that lock serializes analysis against property
//! updates for the same session.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex as SessionLock, MutexGuard};
use tracing::debug;

use crate::analysis::Analyzer;
use crate::error::{AppError, Result};
use crate::types::SessionId;

/// One registered session: its analyzer behind the session lock.
pub struct SessionSlot {
    analyzer_name: String,
    order: u64,
    retired: AtomicBool,
    analyzer: SessionLock<Box<dyn Analyzer>>,
}

impl SessionSlot {
    /// Take the session lock.
    ///
    /// Returns `None` if the session was unregistered or replaced before
    /// the lock was granted; the caller must not touch the analyzer then.
    pub async fn lock(&self) -> Option<MutexGuard<'_, Box<dyn Analyzer>>> {
        let guard = self.analyzer.lock().await;
        if self.is_retired() {
            None
        } else {
            Some(guard)
        }
    }

    pub fn analyzer_name(&self) -> &str {
        &self.analyzer_name
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for SessionSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSlot")
            .field("analyzer_name", &self.analyzer_name)
            .field("order", &self.order)
            .field("retired", &self.is_retired())
            .finish()
    }
}

/// Map from session id to its slot.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<SessionSlot>>>,
    next_order: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an already-constructed analyzer under `id` with a fresh lock.
    ///
    /// Replaces any previous entry for the same id; the old slot is retired
    /// so in-flight holders of it stop using it.
    pub fn register(&self, id: SessionId, analyzer_name: impl Into<String>, analyzer: Box<dyn Analyzer>) {
        let slot = Arc::new(SessionSlot {
            analyzer_name: analyzer_name.into(),
            order: self.next_order.fetch_add(1, Ordering::Relaxed),
            retired: AtomicBool::new(false),
            analyzer: SessionLock::new(analyzer),
        });

        let previous = self.sessions.lock().insert(id.clone(), slot);
        if let Some(previous) = previous {
            previous.retire();
            debug!(session_id = %id, "replaced existing session analyzer");
        }
    }

    /// Remove and discard the entry. Returns whether one existed.
    pub fn unregister(&self, id: &SessionId) -> bool {
        match self.sessions.lock().remove(id) {
            Some(slot) => {
                slot.retire();
                true
            }
            None => false,
        }
    }

    /// Remove `id` only if it still maps to `slot`.
    ///
    /// A session re-registered under the same id keeps its new entry.
    pub fn unregister_slot(&self, id: &SessionId, slot: &Arc<SessionSlot>) -> bool {
        let mut sessions = self.sessions.lock();
        let is_current = sessions
            .get(id)
            .map_or(false, |current| Arc::ptr_eq(current, slot));
        if is_current {
            sessions.remove(id);
        }
        slot.retire();
        is_current
    }

    /// Point-in-time list of sessions in registration order.
    pub fn snapshot(&self) -> Vec<(SessionId, Arc<SessionSlot>)> {
        let mut sessions: Vec<_> = self
            .sessions
            .lock()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect();
        sessions.sort_by_key(|(_, slot)| slot.order);
        sessions
    }

    /// Look up `id`, release the registry lock, then run `f` under the
    /// session's own lock.
    ///
    /// Fails with [`AppError::SessionNotFound`] if the session is absent or
    /// vanished while waiting for its lock.
    pub async fn with_session<F, R>(&self, id: &SessionId, f: F) -> Result<R>
    where
        F: FnOnce(&mut dyn Analyzer) -> R,
    {
        let slot = self
            .sessions
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::SessionNotFound(id.clone()))?;

        let mut guard = slot
            .lock()
            .await
            .ok_or_else(|| AppError::SessionNotFound(id.clone()))?;
        Ok(f(&mut **guard))
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
