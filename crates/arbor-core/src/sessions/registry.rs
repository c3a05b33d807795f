use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::debug;

use super::types::Session;
use crate::agents::SessionKind;

/// In-memory map of live sessions, owned by the controller.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    next_id: AtomicU64,
    titles: Mutex<HashMap<SessionKind, u32>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh opaque id: monotonic counter plus creation millis.
    pub fn next_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("session-{}-{}", n, Utc::now().timestamp_millis())
    }

    /// `"<Display Name> <n>"`, counting per kind.
    pub fn default_title(&self, kind: SessionKind) -> String {
        let mut titles = lock(&self.titles);
        let n = titles.entry(kind).or_insert(0);
        *n += 1;
        format!("{} {}", kind.display_name(), n)
    }

    pub fn insert(&self, session: Arc<Session>) {
        debug!(event = "core.session.registered", session_id = %session.id);
        lock(&self.sessions).insert(session.id.clone(), session);
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        lock(&self.sessions).get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = lock(&self.sessions).remove(id);
        if removed.is_some() {
            debug!(event = "core.session.unregistered", session_id = id);
        }
        removed
    }

    /// All sessions, oldest first.
    pub fn all(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<_> = lock(&self.sessions).values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    pub fn ids(&self) -> Vec<String> {
        self.all().iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
