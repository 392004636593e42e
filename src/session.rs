//! In-memory registry of admitted sessions.
//!
//! A session is keyed by the identifier the caller chose (typically the id of its
//! own conversation thread). Records are created once, never mutated, and only
//! removed by [`SessionRegistry::clear`]. Nothing is persisted across restarts.
//!
//! The registry is an owned value rather than a process global, so each server
//! (and each test) can hold its own instance, usually behind an `Arc`.
//!
//! ```
//! use thread_session::session::SessionRegistry;
//!
//! let registry = SessionRegistry::new();
//! registry.register("thread-42");
//! registry.register("thread-42");
//! assert!(registry.contains("thread-42"));
//! assert_eq!(registry.len(), 1);
//!
//! registry.clear();
//! assert!(!registry.contains("thread-42"));
//! ```

use logwise::privacy::LogIt;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

/// A single admitted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// The caller-supplied identifier.
    pub session_id: String,
    /// Always true; there is no deactivation path.
    pub active: bool,
    /// When the record was registered.
    pub created_at: SystemTime,
}

impl SessionRecord {
    fn new(session_id: String) -> Self {
        SessionRecord {
            session_id,
            active: true,
            created_at: SystemTime::now(),
        }
    }
}

/// Mapping from session identifier to [`SessionRecord`].
///
/// All operations take a single mutex for the duration of one lookup or insert,
/// so concurrent registrations of the same id never produce duplicates and a
/// reader never observes a half-written record.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while the lock is held cannot leave the map half-updated
    // (every critical section is a single map call), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `session_id` if it is non-empty and not yet known.
    ///
    /// Returns `true` when a new record was inserted. Registering an existing id,
    /// or the empty string, is a no-op that returns `false`.
    pub fn register(&self, session_id: &str) -> bool {
        if session_id.is_empty() {
            return false;
        }
        let mut sessions = self.lock();
        if sessions.contains_key(session_id) {
            return false;
        }
        sessions.insert(session_id.to_string(), SessionRecord::new(session_id.to_string()));
        drop(sessions);
        logwise::info_sync!("Registered thread session: {session}", session = LogIt(&session_id));
        true
    }

    /// True iff `session_id` has been registered since the last [`clear`](Self::clear).
    pub fn contains(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    /// Returns a copy of the record for `session_id`, if any.
    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        self.lock().get(session_id).cloned()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no session is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes every record.
    ///
    /// This is an administrative reset (and a test isolation helper); request
    /// handling never calls it.
    pub fn clear(&self) {
        let dropped = {
            let mut sessions = self.lock();
            let n = sessions.len();
            sessions.clear();
            n
        };
        logwise::info_sync!(
            "Cleared all thread sessions ({count} dropped)",
            count = LogIt(&dropped)
        );
    }
}
