//! Bet slip sessions
//!
//! Each open slip is keyed by the id of the interaction that started it and
//! belongs to the user who started it. Interactions from anyone else are
//! rejected before the draft is touched.

use super::draft::BetDraft;
use crate::errors::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// A draft shared between the interaction handlers of one slip.
pub type SharedDraft = Arc<Mutex<BetDraft>>;

#[derive(Debug)]
struct SessionEntry {
    owner_id: String,
    draft: SharedDraft,
}

/// Open bet slips.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<u64, SessionEntry>>>,
    timeout: Duration,
}

impl SessionRegistry {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    /// Opens a slip for `owner_id`, replacing any slip with the same id.
    pub async fn open(&self, session_id: u64, owner_id: &str, guild_id: &str) -> SharedDraft {
        let draft = Arc::new(Mutex::new(BetDraft::new(owner_id, guild_id)));
        self.sessions.write().await.insert(
            session_id,
            SessionEntry {
                owner_id: owner_id.to_string(),
                draft: Arc::clone(&draft),
            },
        );
        draft
    }

    /// The slip, if `actor_id` owns it. Marks the slip as active.
    pub async fn checkout(&self, session_id: u64, actor_id: &str) -> Result<SharedDraft> {
        let draft = {
            let sessions = self.sessions.read().await;
            let entry = sessions
                .get(&session_id)
                .ok_or(Error::SessionNotFound { session_id })?;
            if entry.owner_id != actor_id {
                return Err(Error::NotSessionOwner {
                    user_id: actor_id.to_string(),
                });
            }
            Arc::clone(&entry.draft)
        };

        let mut guard = draft.lock().await;
        if guard.stage().is_terminal() {
            drop(guard);
            self.close(session_id).await;
            return Err(Error::SessionNotFound { session_id });
        }
        guard.touch();
        drop(guard);
        Ok(draft)
    }

    pub async fn close(&self, session_id: u64) {
        self.sessions.write().await.remove(&session_id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Times out idle slips and drops them. Slips busy in a handler are
    /// skipped until the next sweep.
    pub async fn sweep_expired(&self) -> Vec<u64> {
        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();

        for (session_id, entry) in sessions.iter() {
            let Ok(mut draft) = entry.draft.try_lock() else {
                continue;
            };
            if draft.stage().is_terminal() || draft.is_idle(self.timeout) {
                draft.time_out();
                expired.push(*session_id);
            }
        }

        for session_id in &expired {
            sessions.remove(session_id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "Expired idle bet slips");
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::draft::DraftStage;

    #[tokio::test]
    async fn test_other_user_cannot_touch_session() {
        let registry = SessionRegistry::new(Duration::from_secs(300));
        let draft = registry.open(1, "alice", "g1").await;
        draft.lock().await.select_league("NFL").unwrap();

        let result = registry.checkout(1, "bob").await;
        assert!(matches!(result, Err(Error::NotSessionOwner { .. })));

        let draft = registry.checkout(1, "alice").await.unwrap();
        assert_eq!(draft.lock().await.stage(), DraftStage::SelectBetType);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let registry = SessionRegistry::new(Duration::from_secs(300));
        let result = registry.checkout(9, "alice").await;
        assert!(matches!(result, Err(Error::SessionNotFound { session_id: 9 })));
    }

    #[tokio::test]
    async fn test_sweep_times_out_idle_sessions() {
        let registry = SessionRegistry::new(Duration::ZERO);
        let draft = registry.open(1, "alice", "g1").await;

        let expired = registry.sweep_expired().await;
        assert_eq!(expired, vec![1]);
        assert_eq!(draft.lock().await.stage(), DraftStage::TimedOut);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_keeps_active_sessions() {
        let registry = SessionRegistry::new(Duration::from_secs(300));
        registry.open(1, "alice", "g1").await;
        assert!(registry.sweep_expired().await.is_empty());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_cancelled_session_is_closed_on_checkout() {
        let registry = SessionRegistry::new(Duration::from_secs(300));
        let draft = registry.open(1, "alice", "g1").await;
        draft.lock().await.cancel();

        assert!(registry.checkout(1, "alice").await.is_err());
        assert!(registry.is_empty().await);
    }
}
