//! In-memory session store with per-session locks.

use addis_core::{DomainEvent, EventBus, Session};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Counters copied out of the session each time its lock is released.
#[derive(Debug, Clone, Default)]
struct SessionSummary {
    turns: usize,
    state_keys: Vec<String>,
}

impl SessionSummary {
    fn of(session: &Session) -> Self {
        Self {
            turns: session.history.len(),
            state_keys: session.state.keys(),
        }
    }
}

/// A stored session plus its access bookkeeping.
///
/// `last_accessed` and the summary live outside the session lock so they
/// can be read by the sweeper and by administration without waiting for a
/// running turn.
pub struct SessionHandle {
    id: String,
    created_at: DateTime<Utc>,
    session: Mutex<Session>,
    summary: std::sync::RwLock<SessionSummary>,
    last_accessed_ms: AtomicI64,
}

impl SessionHandle {
    fn new(id: String) -> Self {
        let session = Session::new(id.clone());
        Self {
            created_at: session.created_at,
            summary: std::sync::RwLock::new(SessionSummary::of(&session)),
            session: Mutex::new(session),
            id,
            last_accessed_ms: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Take the per-session lock. Held for the duration of one turn.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            session: self.session.lock().await,
            summary: &self.summary,
        }
    }

    fn last_summary(&self) -> SessionSummary {
        self.summary
            .read()
            .map(|s| s.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn touch(&self) {
        self.touch_at(Utc::now());
    }

    fn touch_at(&self, at: DateTime<Utc>) {
        self.last_accessed_ms
            .fetch_max(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_accessed(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_accessed_ms.load(Ordering::Relaxed))
            .unwrap_or_else(Utc::now)
    }

    /// Whether a turn currently holds this session.
    fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }
}

/// Exclusive access to a session. Refreshes the handle's summary on drop.
pub struct SessionGuard<'a> {
    session: MutexGuard<'a, Session>,
    summary: &'a std::sync::RwLock<SessionSummary>,
}

impl Deref for SessionGuard<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let summary = SessionSummary::of(&self.session);
        match self.summary.write() {
            Ok(mut slot) => *slot = summary,
            Err(poisoned) => *poisoned.into_inner() = summary,
        }
    }
}

/// Read-only summary of a session, for administration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Number of history entries (two per completed exchange)
    pub turns: usize,
    pub state_keys: Vec<String>,
}

/// Concurrent session store.
///
/// The map lock is a `std::sync::RwLock` and is never held across an
/// `.await`; per-session work goes through [`SessionHandle::lock`].
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
    timeout: Duration,
    events: Option<Arc<EventBus>>,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            timeout,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Look up a session, creating it on first reference.
    ///
    /// Repeated calls with the same id return the same handle.
    pub fn get_or_create(&self, id: &str) -> Arc<SessionHandle> {
        if let Some(handle) = self.read_map().get(id) {
            handle.touch();
            return Arc::clone(handle);
        }

        let mut map = self.write_map();
        let handle = map
            .entry(id.to_string())
            .or_insert_with(|| {
                debug!(session_id = %id, "Creating session");
                Arc::new(SessionHandle::new(id.to_string()))
            });
        handle.touch();
        Arc::clone(handle)
    }

    /// Look up a session without creating it.
    pub fn get(&self, id: &str) -> Option<Arc<SessionHandle>> {
        self.read_map().get(id).cloned()
    }

    /// Create a session under a fresh UUID and return its id.
    pub fn create_session(&self) -> String {
        let id = Uuid::new_v4().to_string();
        self.get_or_create(&id);
        id
    }

    /// Drop the turn-scoped state of a session, keeping `user:*` keys.
    /// Returns `false` if the session does not exist.
    pub async fn clear_ephemeral_state(&self, id: &str) -> bool {
        let Some(handle) = self.get(id) else {
            return false;
        };
        let removed = handle.lock().await.state.clear_ephemeral();
        debug!(session_id = %id, removed, "Cleared ephemeral session state");
        true
    }

    /// Summary of a session. Never creates one, and never waits for a
    /// running turn: a busy session reports the values from its last
    /// completed lock.
    pub async fn session_metadata(&self, id: &str) -> Option<SessionMetadata> {
        let handle = self.get(id)?;
        let summary = match handle.session.try_lock() {
            Ok(session) => SessionSummary::of(&session),
            Err(_) => handle.last_summary(),
        };
        Some(SessionMetadata {
            id: handle.id.clone(),
            created_at: handle.created_at,
            last_accessed: handle.last_accessed(),
            turns: summary.turns,
            state_keys: summary.state_keys,
        })
    }

    /// Evict sessions idle for longer than the timeout as of `now`.
    /// Sessions with a turn in progress are kept. Returns the number evicted.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let timeout = chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::MAX);

        let (evicted, remaining) = {
            let mut map = self.write_map();
            let before = map.len();
            map.retain(|_, handle| now - handle.last_accessed() <= timeout || handle.is_busy());
            (before - map.len(), map.len())
        };

        if evicted > 0 {
            info!(evicted, remaining, "Evicted idle sessions");
            if let Some(events) = &self.events {
                events.publish(DomainEvent::SessionsSwept {
                    evicted,
                    remaining,
                    timestamp: now,
                });
            }
        }

        evicted
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    // A poisoned map is still structurally valid: entries are only ever
    // inserted or removed whole.
    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<SessionHandle>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<SessionHandle>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }
}
