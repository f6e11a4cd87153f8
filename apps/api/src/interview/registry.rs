//! Session registry — explicit, owned by the serving layer. No ambient
//! global state: every handler reaches sessions through `AppState`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::interview::machine::InterviewSession;

/// Shared handle to one session. The inner async mutex serializes
/// `submit_reply` per session id; concurrent replies to the same session
/// queue up instead of interleaving mid-exchange.
pub type SessionHandle = Arc<tokio::sync::Mutex<InterviewSession>>;

/// In-memory map of live sessions, keyed by session id. The outer lock is
/// held only for map operations, never across an await.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<Uuid, SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: InterviewSession) -> SessionHandle {
        let id = session.id();
        let handle = Arc::new(tokio::sync::Mutex::new(session));
        self.inner
            .lock()
            .expect("session registry lock poisoned")
            .insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.inner
            .lock()
            .expect("session registry lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn remove(&self, id: Uuid) -> Option<SessionHandle> {
        self.inner
            .lock()
            .expect("session registry lock poisoned")
            .remove(&id)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .expect("session registry lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::keywords::KeywordSources;
    use crate::llm_client::testing::ScriptedOracle;

    async fn make_session() -> InterviewSession {
        let oracle = ScriptedOracle::new([r#"{"question": "q", "answer": "a"}"#]);
        let sources = KeywordSources {
            explicit: vec!["Docker".into()],
            ..Default::default()
        };
        InterviewSession::start(&oracle, &sources).await.unwrap().0
    }

    #[tokio::test]
    async fn test_insert_get_remove_roundtrip() {
        let registry = SessionRegistry::new();
        let session = make_session().await;
        let id = session.id();

        registry.insert(session);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(id).is_some());

        assert!(registry.remove(id).is_some());
        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_none() {
        let registry = SessionRegistry::new();
        assert!(registry.get(Uuid::new_v4()).is_none());
    }
}
