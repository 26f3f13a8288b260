use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use inkwell_types::SessionUser;

/// Token -> user mapping for logged-in sessions.
///
/// Entries live only as long as the process; a restart logs everybody out
/// and the session guard clears the orphaned cookies on the next request.
pub trait SessionStore: Send + Sync {
    fn put(&self, token: String, user: SessionUser);
    fn get(&self, token: &str) -> Option<SessionUser>;
    fn remove(&self, token: &str) -> Option<SessionUser>;
}

/// In-process store. Not shared between processes.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionUser>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, token: &str) -> bool {
        self.get(token).is_some()
    }

    /// Drop every session, as a restart would.
    pub fn clear(&self) {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, token: String, user: SessionUser) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token, user);
    }

    fn get(&self, token: &str) -> Option<SessionUser> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(token)
            .cloned()
    }

    fn remove(&self, token: &str) -> Option<SessionUser> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
    }
}
