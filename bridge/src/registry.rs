use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::session::Session;

/// Process-wide call id -> Session map. `dashmap` gives us sharded locking so
/// lookup is effectively wait-free on the hot path while creation for a given
/// call id is still exclusive.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, call_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(call_id).map(|entry| entry.clone())
    }

    /// Inserts `session` under `call_id` only if absent; returns the
    /// winning session either way (the caller's if it won, the existing one
    /// if it lost the race).
    pub fn get_or_insert_with(
        &self,
        call_id: String,
        make: impl FnOnce() -> Arc<Session>,
    ) -> Arc<Session> {
        match self.sessions.entry(call_id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let session = make();
                entry.insert(session.clone());
                session
            }
        }
    }

    pub fn remove(&self, call_id: &str) {
        self.sessions.remove(call_id);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn call_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}
