use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::advisory::{AdvisoryResult, ModelSettings};
use crate::chat::ChatTranscript;
use crate::questionnaire::QuestionnaireInput;

/// Everything one browser session holds between actions.
#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub questionnaire: Option<QuestionnaireInput>,
    pub ai_enabled: bool,
    pub model: ModelSettings,
    pub last_advice: Option<AdvisoryResult>,
    pub transcript: ChatTranscript,
}

impl SessionState {
    pub fn new(ai_enabled: bool, model: ModelSettings) -> Self {
        Self {
            questionnaire: None,
            ai_enabled,
            model,
            last_advice: None,
            transcript: ChatTranscript::new(),
        }
    }

    /// Clears the questionnaire, the last advice and the chat transcript.
    /// The AI toggle and model settings survive a reset.
    pub fn reset(&mut self) {
        self.questionnaire = None;
        self.last_advice = None;
        self.transcript.clear();
    }
}

/// Sessions keyed by the id in the session cookie.
///
/// Each session has its own lock; the map lock is only held to look one up.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Arc<Mutex<SessionState>>>>>,
    ai_enabled: bool,
    model: ModelSettings,
}

impl SessionStore {
    pub fn new(ai_enabled: bool, model: ModelSettings) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ai_enabled,
            model,
        }
    }

    fn fresh(&self) -> Arc<Mutex<SessionState>> {
        Arc::new(Mutex::new(SessionState::new(self.ai_enabled, self.model.clone())))
    }

    async fn entry(&self, id: Uuid) -> Arc<Mutex<SessionState>> {
        let mut sessions = self.sessions.lock().await;
        sessions.entry(id).or_insert_with(|| self.fresh()).clone()
    }

    /// Returns the id to use: the given one when known, otherwise a fresh session.
    pub async fn ensure(&self, id: Option<Uuid>) -> Uuid {
        let mut sessions = self.sessions.lock().await;
        if let Some(id) = id.filter(|id| sessions.contains_key(id)) {
            return id;
        }
        let id = Uuid::new_v4();
        sessions.insert(id, self.fresh());
        info!(%id, "Created session");
        id
    }

    /// Exclusive access to one session. Other actions on the same session wait
    /// until the guard is dropped, so it may be held across a backend call.
    pub async fn lock(&self, id: Uuid) -> OwnedMutexGuard<SessionState> {
        let session = self.entry(id).await;
        debug!(%id, "Locking session");
        session.lock_owned().await
    }

    /// Copy of the state. Waits for any action running on the session.
    pub async fn snapshot(&self, id: Uuid) -> SessionState {
        let state = self.lock(id).await;
        state.clone()
    }

    /// Runs `f` against the session state under the session lock.
    pub async fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.lock(id).await;
        f(&mut state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::AdvisorySource;
    use crate::chat::Role;
    use chrono::Local;

    fn filled() -> SessionState {
        let mut state = SessionState::new(false, ModelSettings::default());
        state.questionnaire = Some(QuestionnaireInput {
            software: "Exact".to_string(),
            ..Default::default()
        });
        state.last_advice = Some(AdvisoryResult {
            text: "advies".to_string(),
            generated_at: Local::now(),
            source: AdvisorySource::Stub,
        });
        state.transcript.push(Role::User, "vraag");
        state.model.model = "custom-model".to_string();
        state
    }

    #[test]
    fn test_reset_clears_enumerated_fields_only() {
        let mut state = filled();
        state.reset();
        assert!(state.questionnaire.is_none());
        assert!(state.last_advice.is_none());
        assert!(state.transcript.is_empty());
        assert!(!state.ai_enabled);
        assert_eq!(state.model.model, "custom-model");
    }

    #[tokio::test]
    async fn test_store_reuses_known_ids() {
        let store = SessionStore::new(true, ModelSettings::default());
        let id = store.ensure(None).await;
        assert_eq!(store.ensure(Some(id)).await, id);
        assert_ne!(store.ensure(Some(Uuid::new_v4())).await, id);

        store.update(id, |s| s.transcript.push(Role::User, "hallo")).await;
        assert_eq!(store.snapshot(id).await.transcript.len(), 1);
        assert!(store.snapshot(id).await.ai_enabled);
    }

    #[tokio::test]
    async fn test_actions_on_one_session_run_in_turn() {
        let store = SessionStore::new(false, ModelSettings::default());
        let id = store.ensure(None).await;

        let mut guard = store.lock(id).await;
        let waiting = {
            let store = store.clone();
            tokio::spawn(async move { store.update(id, |s| s.transcript.push(Role::User, "tweede")).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiting.is_finished());

        guard.transcript.push(Role::User, "eerste");
        drop(guard);
        waiting.await.unwrap();

        let turns: Vec<_> = store
            .snapshot(id)
            .await
            .transcript
            .turns()
            .iter()
            .map(|t| t.content.clone())
            .collect();
        assert_eq!(turns, vec!["eerste", "tweede"]);
    }

    #[tokio::test]
    async fn test_other_sessions_are_not_blocked() {
        let store = SessionStore::new(false, ModelSettings::default());
        let busy = store.ensure(None).await;
        let other = store.ensure(None).await;

        let _guard = store.lock(busy).await;
        store.update(other, |s| s.ai_enabled = true).await;
        assert!(store.snapshot(other).await.ai_enabled);
    }
}
