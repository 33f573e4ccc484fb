//! Persistence collaborator for editor sessions.
//!
//! The backend owns the authoritative draft and published documents and
//! guards draft writes with a revision token (optimistic compare-and-swap).

use sd_core::model::{ScreenDocument, ScreenStatus};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("screen `{0}` not found")]
    NotFound(String),

    #[error("access to screen `{0}` is forbidden")]
    Forbidden(String),

    /// The server draft moved past the caller's baseline. Nothing was
    /// written.
    #[error("draft was changed by someone else (server revision {server_revision})")]
    Conflict {
        server_revision: u64,
        server_draft: Option<Box<ScreenDocument>>,
    },

    #[error("network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedScreen {
    pub draft: ScreenDocument,
    pub published: Option<ScreenDocument>,
    /// Draft revision token for the next save.
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveResponse {
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishResponse {
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RollbackResponse {
    pub draft: ScreenDocument,
    pub revision: u64,
}

/// Backend operations an editor session needs. All calls may fail and are
/// never retried by the session.
pub trait ScreenStore {
    fn load_screen(
        &self,
        asset_id: &str,
    ) -> impl Future<Output = Result<LoadedScreen, StoreError>> + Send;

    /// Overwrite the draft if the server revision still equals
    /// `baseline_revision`; otherwise fail with [`StoreError::Conflict`].
    fn save_draft(
        &self,
        asset_id: &str,
        document: &ScreenDocument,
        baseline_revision: u64,
    ) -> impl Future<Output = Result<SaveResponse, StoreError>> + Send;

    fn publish(&self, asset_id: &str) -> impl Future<Output = Result<PublishResponse, StoreError>> + Send;

    fn rollback(&self, asset_id: &str) -> impl Future<Output = Result<RollbackResponse, StoreError>> + Send;

    /// Run an action handler in dry-run mode. The result is opaque.
    fn test_action(
        &self,
        action_id: &str,
        payload: &Value,
    ) -> impl Future<Output = Result<Value, StoreError>> + Send;
}

// ─── In-memory store ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct StoredScreen {
    draft: ScreenDocument,
    published: Option<ScreenDocument>,
    revision: u64,
}

#[derive(Debug, Default)]
struct Inner {
    screens: HashMap<String, StoredScreen>,
    forbidden: HashSet<String>,
    /// Error returned by the next call, then cleared.
    fail_next: Option<StoreError>,
    action_results: HashMap<String, Result<Value, String>>,
    tested_actions: Vec<String>,
}

/// Thread-safe in-memory [`ScreenStore`]. Clones share the same state, so a
/// test can hold one handle while a session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means another test thread panicked mid-call;
        // the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a draft at revision 1.
    #[must_use]
    pub fn with_screen(self, asset_id: &str, draft: ScreenDocument) -> Self {
        self.insert_screen(asset_id, draft, None);
        self
    }

    pub fn insert_screen(&self, asset_id: &str, draft: ScreenDocument, published: Option<ScreenDocument>) {
        self.lock().screens.insert(
            asset_id.to_string(),
            StoredScreen {
                draft,
                published,
                revision: 1,
            },
        );
    }

    pub fn forbid(&self, asset_id: &str) {
        self.lock().forbidden.insert(asset_id.to_string());
    }

    /// Make the next call fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        self.lock().fail_next = Some(error);
    }

    /// Configure the dry-run outcome for an action id.
    pub fn set_action_result(&self, action_id: &str, result: Result<Value, String>) {
        self.lock().action_results.insert(action_id.to_string(), result);
    }

    /// Action ids passed to `test_action`, in call order.
    pub fn tested_actions(&self) -> Vec<String> {
        self.lock().tested_actions.clone()
    }

    pub fn draft(&self, asset_id: &str) -> Option<ScreenDocument> {
        self.lock().screens.get(asset_id).map(|s| s.draft.clone())
    }

    pub fn published(&self, asset_id: &str) -> Option<ScreenDocument> {
        self.lock().screens.get(asset_id).and_then(|s| s.published.clone())
    }

    pub fn revision(&self, asset_id: &str) -> Option<u64> {
        self.lock().screens.get(asset_id).map(|s| s.revision)
    }

    /// Edit the draft as another session would, bumping the revision.
    pub fn edit_draft(&self, asset_id: &str, f: impl FnOnce(&mut ScreenDocument)) -> Option<u64> {
        let mut inner = self.lock();
        let stored = inner.screens.get_mut(asset_id)?;
        f(&mut stored.draft);
        stored.revision += 1;
        Some(stored.revision)
    }

    fn guard<'a>(inner: &'a mut Inner, asset_id: &str) -> Result<&'a mut StoredScreen, StoreError> {
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }
        if inner.forbidden.contains(asset_id) {
            return Err(StoreError::Forbidden(asset_id.to_string()));
        }
        inner
            .screens
            .get_mut(asset_id)
            .ok_or_else(|| StoreError::NotFound(asset_id.to_string()))
    }
}

impl ScreenStore for MemoryStore {
    async fn load_screen(&self, asset_id: &str) -> Result<LoadedScreen, StoreError> {
        let mut inner = self.lock();
        let stored = Self::guard(&mut inner, asset_id)?;
        Ok(LoadedScreen {
            draft: stored.draft.clone(),
            published: stored.published.clone(),
            revision: stored.revision,
        })
    }

    async fn save_draft(
        &self,
        asset_id: &str,
        document: &ScreenDocument,
        baseline_revision: u64,
    ) -> Result<SaveResponse, StoreError> {
        let mut inner = self.lock();
        let stored = Self::guard(&mut inner, asset_id)?;
        if stored.revision != baseline_revision {
            return Err(StoreError::Conflict {
                server_revision: stored.revision,
                server_draft: Some(Box::new(stored.draft.clone())),
            });
        }
        stored.draft = document.clone();
        stored.revision += 1;
        Ok(SaveResponse {
            revision: stored.revision,
        })
    }

    async fn publish(&self, asset_id: &str) -> Result<PublishResponse, StoreError> {
        let mut inner = self.lock();
        let stored = Self::guard(&mut inner, asset_id)?;
        let version = stored.draft.version + 1;
        stored.draft.version = version;
        stored.draft.status = ScreenStatus::Published;
        stored.published = Some(stored.draft.clone());
        Ok(PublishResponse { version })
    }

    async fn rollback(&self, asset_id: &str) -> Result<RollbackResponse, StoreError> {
        let mut inner = self.lock();
        let stored = Self::guard(&mut inner, asset_id)?;
        let mut draft = stored
            .published
            .clone()
            .unwrap_or_else(|| stored.draft.clone());
        draft.status = ScreenStatus::Draft;
        stored.draft = draft.clone();
        stored.revision += 1;
        Ok(RollbackResponse {
            draft,
            revision: stored.revision,
        })
    }

    async fn test_action(&self, action_id: &str, payload: &Value) -> Result<Value, StoreError> {
        let mut inner = self.lock();
        if let Some(err) = inner.fail_next.take() {
            return Err(err);
        }
        inner.tested_actions.push(action_id.to_string());
        match inner.action_results.get(action_id) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(message)) => Err(StoreError::Network(message.clone())),
            None => Ok(json!({ "ok": true, "action": action_id, "payload": payload })),
        }
    }
}
