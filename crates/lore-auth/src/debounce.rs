//! Fire-and-forget `last_used_at` bookkeeping (§4.2, §9): at most one write
//! per credential per 60 s, dispatched as a detached task that never blocks
//! or fails the request it rode in on.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lore_core::LoreId;
use sqlx::PgPool;

pub const DEBOUNCE_WINDOW_SECONDS: u64 = 60;

pub struct LastUsedDebouncer {
    last_dispatched: DashMap<LoreId, Instant>,
    window: Duration,
}

impl LastUsedDebouncer {
    pub fn new(window_seconds: u64) -> Self {
        Self { last_dispatched: DashMap::new(), window: Duration::from_secs(window_seconds) }
    }

    /// Spawns the DB write only if this credential hasn't been touched
    /// within the debounce window. Never awaited by the caller.
    pub fn touch(self: &Arc<Self>, pool: PgPool, id: LoreId) {
        let should_dispatch = match self.last_dispatched.get(&id) {
            Some(last) => last.elapsed() >= self.window,
            None => true,
        };
        if !should_dispatch {
            return;
        }
        self.last_dispatched.insert(id, Instant::now());

        tokio::spawn(async move {
            if let Err(error) = lore_db::keys::touch_last_used(&pool, id).await {
                tracing::warn!(%error, credential_id = %id, "failed to update last_used_at");
            }
        });
    }
}

impl Default for LastUsedDebouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW_SECONDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_touch_always_dispatches() {
        let debouncer = LastUsedDebouncer::new(60);
        let id = LoreId::new();
        assert!(debouncer.last_dispatched.get(&id).is_none());
        debouncer.last_dispatched.insert(id, Instant::now());
        assert!(debouncer.last_dispatched.get(&id).is_some());
    }

    #[test]
    fn within_window_is_not_due_again() {
        let debouncer = LastUsedDebouncer::new(60);
        let id = LoreId::new();
        debouncer.last_dispatched.insert(id, Instant::now());
        let due = match debouncer.last_dispatched.get(&id) {
            Some(last) => last.elapsed() >= debouncer.window,
            None => true,
        };
        assert!(!due);
    }
}
