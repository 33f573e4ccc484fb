//! Editor session: the working copy of one screen plus everything the
//! editor tracks around it.
//!
//! Flow: `open` → edits (`commit` records history, marks the draft
//! modified, revalidates) → `save_draft` / `publish` through the
//! [`ScreenStore`]. Edits are synchronous; only store calls await.

use crate::error::EditorError;
use crate::history::{DEFAULT_DEPTH, History};
use crate::selection::{self, ComponentTemplate, Selection};
use crate::shortcuts::ShortcutAction;
use crate::store::{LoadedScreen, SaveResponse, ScreenStore, StoreError};
use sd_core::error::PatchError;
use sd_core::id::ComponentId;
use sd_core::merge::three_way_merge;
use sd_core::model::{ActionPatch, ComponentActionRef, GridRect, ScreenDocument, ScreenStatus};
use sd_core::patch::{self, PatchEnvelope, PatchOperation, validate_patch_array};
use sd_core::tree::{self, MoveDirection};
use sd_core::validate::{ValidationContext, ValidationIssue, ValidationReport, dry_run_targets, validate_document};
use serde_json::{Map, Value};

// ─── Configuration ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum undo steps kept.
    pub history_depth: usize,
    /// Exercise every action through the store's dry-run before publishing.
    pub run_dry_run: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_depth: DEFAULT_DEPTH,
            run_dry_run: false,
        }
    }
}

// ─── Session state types ─────────────────────────────────────────────────

/// Lifecycle of a copilot-proposed patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProposalState {
    #[default]
    Idle,
    /// Structurally valid and stored, not applied.
    Proposed,
    /// Rendered against a temporary document, not committed.
    Previewed,
    Applied,
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProposedPatch {
    pub ops: Vec<PatchOperation>,
    pub notes: Option<String>,
    /// Result of the last preview.
    pub preview: Option<ScreenDocument>,
}

/// Outcome of the last save that hit a stale baseline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftConflict {
    pub has_conflict: bool,
    pub message: Option<String>,
    /// Three-way merge of the local edits onto the server draft, if one
    /// could be computed.
    pub auto_merged: Option<ScreenDocument>,
    pub server_draft: Option<ScreenDocument>,
    pub server_revision: Option<u64>,
}

/// A draft write captured by [`EditorSession::begin_save`]. Edits may
/// continue while it is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub asset_id: String,
    pub document: ScreenDocument,
    pub baseline_revision: u64,
}

// ─── Session ─────────────────────────────────────────────────────────────

pub struct EditorSession<S: ScreenStore> {
    store: S,
    asset_id: String,
    config: SessionConfig,
    validation_context: ValidationContext,

    document: ScreenDocument,
    published: Option<ScreenDocument>,
    /// Server draft as of the last load or successful save; merge base.
    baseline: ScreenDocument,
    revision: u64,

    history: History,
    selection: Selection,
    clipboard: Vec<ComponentTemplate>,
    proposal: Option<ProposedPatch>,
    proposal_state: ProposalState,
    draft_modified: bool,
    validation: ValidationReport,
    conflict: DraftConflict,
    saving: bool,
}

impl<S: ScreenStore> EditorSession<S> {
    /// Build a session around an already loaded screen.
    pub fn new(
        store: S,
        asset_id: &str,
        loaded: LoadedScreen,
        config: SessionConfig,
        validation_context: ValidationContext,
    ) -> Self {
        let history = History::new(config.history_depth);
        let mut session = Self {
            store,
            asset_id: asset_id.to_string(),
            config,
            validation_context,
            baseline: loaded.draft.clone(),
            document: loaded.draft,
            published: loaded.published,
            revision: loaded.revision,
            history,
            selection: Selection::new(),
            clipboard: Vec::new(),
            proposal: None,
            proposal_state: ProposalState::Idle,
            draft_modified: false,
            validation: ValidationReport::default(),
            conflict: DraftConflict::default(),
            saving: false,
        };
        session.revalidate();
        session
    }

    /// Load `asset_id` from the store and start editing it.
    pub async fn open(
        store: S,
        asset_id: &str,
        config: SessionConfig,
        validation_context: ValidationContext,
    ) -> Result<Self, EditorError> {
        let loaded = store.load_screen(asset_id).await?;
        log::info!("opened {asset_id} at revision {}", loaded.revision);
        Ok(Self::new(store, asset_id, loaded, config, validation_context))
    }

    // ── Accessors ──

    pub fn document(&self) -> &ScreenDocument {
        &self.document
    }

    pub fn published(&self) -> Option<&ScreenDocument> {
        self.published.as_ref()
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_draft_modified(&self) -> bool {
        self.draft_modified
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn is_read_only(&self) -> bool {
        !self.document.is_draft()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn clipboard(&self) -> &[ComponentTemplate] {
        &self.clipboard
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn validation(&self) -> &ValidationReport {
        &self.validation
    }

    pub fn draft_conflict(&self) -> &DraftConflict {
        &self.conflict
    }

    pub fn proposal(&self) -> Option<&ProposedPatch> {
        self.proposal.as_ref()
    }

    pub fn proposal_state(&self) -> ProposalState {
        self.proposal_state
    }

    // ── Commit plumbing ──

    fn ensure_editable(&self) -> Result<(), EditorError> {
        if self.is_read_only() {
            return Err(EditorError::ReadOnly);
        }
        Ok(())
    }

    /// Re-run the gate's synchronous checks.
    pub fn revalidate(&mut self) -> &ValidationReport {
        self.validation = validate_document(&self.document, &self.validation_context);
        &self.validation
    }

    fn after_change(&mut self) {
        self.draft_modified = true;
        self.selection.prune(&self.document);
        self.revalidate();
    }

    /// Run `f` on a copy of the document. On success, and if anything
    /// changed, the copy replaces the document and the previous version is
    /// recorded in history.
    fn commit<T, E>(
        &mut self,
        description: &str,
        f: impl FnOnce(&mut ScreenDocument) -> Result<T, E>,
    ) -> Result<T, EditorError>
    where
        E: Into<EditorError>,
    {
        self.ensure_editable()?;
        let mut next = self.document.clone();
        let out = f(&mut next).map_err(Into::into)?;
        if next != self.document {
            let before = std::mem::replace(&mut self.document, next);
            self.history.record(before, description);
            self.after_change();
        }
        Ok(out)
    }

    // ── Tree edits ──

    pub fn add_component(&mut self, type_name: &str, at_index: Option<usize>) -> Result<ComponentId, EditorError> {
        let id = self.commit(&format!("add {type_name}"), |doc| {
            tree::add_component(doc, type_name, at_index)
        })?;
        self.selection.select(id);
        Ok(id)
    }

    pub fn add_component_to_parent(
        &mut self,
        type_name: &str,
        parent_id: ComponentId,
    ) -> Result<ComponentId, EditorError> {
        let id = self.commit(&format!("add {type_name}"), |doc| {
            tree::add_component_to_parent(doc, type_name, parent_id)
        })?;
        self.selection.select(id);
        Ok(id)
    }

    /// Returns `false` (and records nothing) at a sibling boundary.
    pub fn move_component(&mut self, id: ComponentId, direction: MoveDirection) -> Result<bool, EditorError> {
        self.commit("move component", |doc| tree::move_component(doc, id, direction))
    }

    pub fn move_component_to_parent(&mut self, id: ComponentId, new_parent: ComponentId) -> Result<(), EditorError> {
        self.commit("move component", |doc| {
            tree::move_component_to_parent(doc, id, new_parent)
        })
    }

    pub fn reorder_component_at_index(
        &mut self,
        id: ComponentId,
        new_index: usize,
        parent: Option<ComponentId>,
    ) -> Result<(), EditorError> {
        self.commit("reorder component", |doc| {
            tree::reorder_component_at_index(doc, id, new_index, parent)
        })
    }

    pub fn update_component_props(&mut self, id: ComponentId, partial: Map<String, Value>) -> Result<(), EditorError> {
        self.commit("edit props", |doc| tree::update_component_props(doc, id, partial))
    }

    pub fn update_component_label(&mut self, id: ComponentId, label: &str) -> Result<(), EditorError> {
        self.commit("rename component", |doc| tree::update_component_label(doc, id, label))
    }

    pub fn update_component_visibility(&mut self, id: ComponentId, rule: Option<&str>) -> Result<(), EditorError> {
        self.commit("edit visibility", |doc| {
            tree::update_component_visibility(doc, id, rule)
        })
    }

    pub fn update_component_layout(&mut self, id: ComponentId, rect: GridRect) -> Result<(), EditorError> {
        self.commit("move on grid", |doc| tree::update_component_layout(doc, id, rect))
    }

    pub fn add_component_action(&mut self, id: ComponentId, action: ComponentActionRef) -> Result<(), EditorError> {
        self.commit("add action", |doc| tree::add_component_action(doc, id, action))
    }

    pub fn update_component_action(
        &mut self,
        id: ComponentId,
        action_id: &str,
        patch: ActionPatch,
    ) -> Result<(), EditorError> {
        self.commit("edit action", |doc| {
            tree::update_component_action(doc, id, action_id, patch)
        })
    }

    pub fn delete_component_action(&mut self, id: ComponentId, action_id: &str) -> Result<(), EditorError> {
        self.commit("delete action", |doc| {
            tree::delete_component_action(doc, id, action_id).map(|_| ())
        })
    }

    pub fn delete_component(&mut self, id: ComponentId) -> Result<(), EditorError> {
        self.commit("delete component", |doc| {
            tree::delete_component(doc, id).map(|_| ())
        })
    }

    /// Delete every selected subtree. Returns how many subtrees were removed.
    pub fn delete_selected_components(&mut self) -> Result<usize, EditorError> {
        let ids = selection::normalize_selection(&self.document, &self.selection.ids());
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self.commit("delete components", |doc| {
            Ok::<_, EditorError>(tree::delete_components(doc, &ids).len())
        })?;
        self.selection.clear();
        Ok(removed)
    }

    // ── Selection ──

    pub fn select(&mut self, id: ComponentId) {
        self.selection.select(id);
    }

    pub fn toggle_selection(&mut self, id: ComponentId) {
        self.selection.toggle(id);
    }

    pub fn range_select(&mut self, id: ComponentId) {
        self.selection.range_select(&self.document, id);
    }

    pub fn select_all(&mut self) {
        self.selection.select_all(&self.document);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ── Clipboard ──

    /// Copy the selected subtrees. Returns how many were copied.
    pub fn copy_selected_components(&mut self) -> usize {
        let templates = selection::copy_components(&self.document, &self.selection.ids());
        if !templates.is_empty() {
            self.clipboard = templates;
        }
        log::debug!("copied {} component(s)", self.clipboard.len());
        self.clipboard.len()
    }

    pub fn cut_selected_components(&mut self) -> Result<usize, EditorError> {
        self.ensure_editable()?;
        if self.copy_selected_components() == 0 || self.selection.is_empty() {
            return Ok(0);
        }
        self.delete_selected_components()
    }

    /// Paste the clipboard after the selection. The pasted roots become the
    /// new selection.
    pub fn paste_components(&mut self) -> Result<Vec<ComponentId>, EditorError> {
        if self.clipboard.is_empty() {
            return Ok(Vec::new());
        }
        let templates = self.clipboard.clone();
        let after = self.selection.ids();
        let pasted = self.commit("paste", |doc| {
            selection::paste_components(doc, &templates, &after)
        })?;
        self.select_created(&pasted);
        Ok(pasted)
    }

    /// Clone the selection in place. The clipboard is left alone.
    pub fn duplicate_selected_components(&mut self) -> Result<Vec<ComponentId>, EditorError> {
        let ids = self.selection.ids();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let created = self.commit("duplicate", |doc| selection::duplicate_components(doc, &ids))?;
        self.select_created(&created);
        Ok(created)
    }

    fn select_created(&mut self, ids: &[ComponentId]) {
        match ids {
            [] => {}
            [single] => self.selection.select(*single),
            many => {
                self.selection.clear();
                for id in many {
                    self.selection.toggle(*id);
                }
            }
        }
    }

    // ── History ──

    pub fn undo(&mut self) -> Result<Option<String>, EditorError> {
        self.ensure_editable()?;
        let description = self.history.undo(&mut self.document);
        if description.is_some() {
            self.after_change();
        }
        Ok(description)
    }

    pub fn redo(&mut self) -> Result<Option<String>, EditorError> {
        self.ensure_editable()?;
        let description = self.history.redo(&mut self.document);
        if description.is_some() {
            self.after_change();
        }
        Ok(description)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Group the following edits into one undo step (e.g. a drag gesture).
    pub fn begin_batch(&mut self, description: &str) {
        self.history.begin_batch(&self.document, description);
    }

    pub fn end_batch(&mut self) {
        self.history.end_batch(&self.document);
    }

    // ── Patches ──

    /// Apply a patch immediately as one undo step.
    pub fn apply_patch(&mut self, ops: &[PatchOperation]) -> Result<(), EditorError> {
        self.commit("apply patch", |doc| {
            *doc = patch::apply_patch(doc, ops)?;
            Ok::<_, PatchError>(())
        })
    }

    /// Store a structurally valid patch for review.
    pub fn propose_patch(&mut self, ops: Vec<PatchOperation>, notes: Option<String>) -> Result<(), EditorError> {
        self.ensure_editable()?;
        let issues = validate_patch_array(&ops);
        if !issues.is_empty() {
            log::warn!("rejected proposed patch with {} issue(s)", issues.len());
            return Err(PatchError::Invalid(issues).into());
        }
        self.proposal = Some(ProposedPatch {
            ops,
            notes,
            preview: None,
        });
        self.proposal_state = ProposalState::Proposed;
        Ok(())
    }

    /// Parse a copilot envelope and propose its patch.
    pub fn propose_envelope(&mut self, text: &str) -> Result<(), EditorError> {
        let envelope = PatchEnvelope::parse(text)?;
        self.propose_patch(envelope.patch, envelope.notes)
    }

    /// Apply the proposal to a temporary copy of the document.
    pub fn preview_proposed_patch(&mut self) -> Result<&ScreenDocument, EditorError> {
        let proposal = self.proposal.as_mut().ok_or(EditorError::NoProposedPatch)?;
        let preview = patch::apply_patch(&self.document, &proposal.ops)?;
        self.proposal_state = ProposalState::Previewed;
        Ok(proposal.preview.insert(preview))
    }

    /// Commit the proposal. On failure the proposal stays pending.
    pub fn apply_proposed_patch(&mut self) -> Result<(), EditorError> {
        let ops = match &self.proposal {
            Some(p) => p.ops.clone(),
            None => return Err(EditorError::NoProposedPatch),
        };
        self.commit("apply proposed patch", |doc| {
            *doc = patch::apply_patch(doc, &ops)?;
            Ok::<_, PatchError>(())
        })?;
        self.proposal = None;
        self.proposal_state = ProposalState::Applied;
        log::info!("applied proposed patch ({} op(s))", ops.len());
        Ok(())
    }

    pub fn discard_proposed_patch(&mut self) -> Result<(), EditorError> {
        self.proposal.take().ok_or(EditorError::NoProposedPatch)?;
        self.proposal_state = ProposalState::Discarded;
        Ok(())
    }

    // ── Shortcuts ──

    /// Run a synchronous shortcut action. Returns `false` for actions the
    /// host must handle itself (saving).
    pub fn dispatch(&mut self, action: ShortcutAction) -> Result<bool, EditorError> {
        match action {
            ShortcutAction::Undo => {
                self.undo()?;
            }
            ShortcutAction::Redo => {
                self.redo()?;
            }
            ShortcutAction::Copy => {
                self.copy_selected_components();
            }
            ShortcutAction::Cut => {
                self.cut_selected_components()?;
            }
            ShortcutAction::Paste => {
                self.paste_components()?;
            }
            ShortcutAction::Duplicate => {
                self.duplicate_selected_components()?;
            }
            ShortcutAction::Delete => {
                self.delete_selected_components()?;
            }
            ShortcutAction::MoveUp | ShortcutAction::MoveDown => {
                let direction = if action == ShortcutAction::MoveUp {
                    MoveDirection::Up
                } else {
                    MoveDirection::Down
                };
                if let Some(id) = self.selection.primary() {
                    self.move_component(id, direction)?;
                }
            }
            ShortcutAction::SelectAll => self.select_all(),
            ShortcutAction::Deselect => self.clear_selection(),
            ShortcutAction::Save => return Ok(false),
        }
        Ok(true)
    }

    // ── Saving ──

    /// Capture the current draft for writing. Fails if a save is pending.
    pub fn begin_save(&mut self) -> Result<SaveRequest, EditorError> {
        if self.saving {
            return Err(EditorError::SaveInProgress);
        }
        if !self.document.is_draft() {
            return Err(EditorError::NotDraft);
        }
        self.saving = true;
        Ok(SaveRequest {
            asset_id: self.asset_id.clone(),
            document: self.document.clone(),
            baseline_revision: self.revision,
        })
    }

    /// Record the store's answer to a [`SaveRequest`].
    pub fn finish_save(
        &mut self,
        request: SaveRequest,
        result: Result<SaveResponse, StoreError>,
    ) -> Result<(), EditorError> {
        self.saving = false;
        match result {
            Ok(response) => {
                self.revision = response.revision;
                self.draft_modified = self.document != request.document;
                self.baseline = request.document;
                self.conflict = DraftConflict::default();
                log::info!("saved {} at revision {}", self.asset_id, self.revision);
                Ok(())
            }
            Err(StoreError::Conflict {
                server_revision,
                server_draft,
            }) => {
                let server_draft = server_draft.map(|d| *d);
                let auto_merged = server_draft
                    .as_ref()
                    .and_then(|server| three_way_merge(&self.baseline, &self.document, server));
                let message = format!(
                    "the draft was changed elsewhere (revision {} → {server_revision}); reload, merge, or overwrite",
                    request.baseline_revision
                );
                log::warn!("save of {} conflicted: {message}", self.asset_id);
                self.conflict = DraftConflict {
                    has_conflict: true,
                    message: Some(message.clone()),
                    auto_merged,
                    server_draft,
                    server_revision: Some(server_revision),
                };
                Err(EditorError::ConflictDetected { message })
            }
            Err(err) => {
                log::warn!("save of {} failed: {err}", self.asset_id);
                Err(err.into())
            }
        }
    }

    /// Write the draft if the server still holds the baseline revision.
    pub async fn save_draft(&mut self) -> Result<(), EditorError> {
        let request = self.begin_save()?;
        let result = self
            .store
            .save_draft(&request.asset_id, &request.document, request.baseline_revision)
            .await;
        self.finish_save(request, result)
    }

    /// Overwrite the server draft regardless of what it holds. The current
    /// server revision is read fresh; if the draft moves again before the
    /// write lands, the write is retried against the newer revision.
    pub async fn force_save_draft(&mut self) -> Result<(), EditorError> {
        let mut request = self.begin_save()?;
        let mut baseline = match self.store.load_screen(&self.asset_id).await {
            Ok(loaded) => loaded.revision,
            Err(err) => {
                self.saving = false;
                return Err(err.into());
            }
        };
        let result = loop {
            log::info!("force-saving {} over revision {baseline}", self.asset_id);
            match self
                .store
                .save_draft(&request.asset_id, &request.document, baseline)
                .await
            {
                Err(StoreError::Conflict { server_revision, .. }) if server_revision != baseline => {
                    baseline = server_revision;
                }
                other => break other,
            }
        };
        request.baseline_revision = baseline;
        self.finish_save(request, result)
    }

    pub fn clear_draft_conflict(&mut self) {
        self.conflict = DraftConflict::default();
    }

    /// Adopt the auto-merged draft as the working copy, rebased on the
    /// server revision it was merged with. Undoable.
    pub fn apply_auto_merged_conflict(&mut self) -> Result<(), EditorError> {
        self.ensure_editable()?;
        let merged = self.conflict.auto_merged.take().ok_or(EditorError::NoAutoMerge)?;
        let conflict = std::mem::take(&mut self.conflict);
        if let Some(revision) = conflict.server_revision {
            self.revision = revision;
        }
        if let Some(server) = conflict.server_draft {
            self.baseline = server;
        }
        let before = std::mem::replace(&mut self.document, merged);
        self.history.record(before, "apply merged draft");
        self.after_change();
        log::info!("adopted auto-merged draft at revision {}", self.revision);
        Ok(())
    }

    // ── Validation & publishing ──

    /// Synchronous checks, then (if they pass) a dry-run of every action.
    /// Dry-run failures are reported as warnings.
    pub async fn validate_with_dry_run(&mut self) -> &ValidationReport {
        let mut report = validate_document(&self.document, &self.validation_context);
        if report.is_publishable() {
            for target in dry_run_targets(&self.document) {
                if let Err(err) = self.store.test_action(&target.action_id, &target.payload).await {
                    report.extend([ValidationIssue::dry_run(
                        &target.action_id,
                        target.component_id,
                        err.to_string(),
                    )]);
                }
            }
        }
        self.validation = report;
        &self.validation
    }

    /// Publish the draft. Unsaved edits are saved first. Returns the new
    /// published version.
    pub async fn publish(&mut self) -> Result<u64, EditorError> {
        if !self.document.is_draft() {
            return Err(EditorError::NotDraft);
        }
        if self.saving {
            return Err(EditorError::SaveInProgress);
        }
        let report = if self.config.run_dry_run {
            self.validate_with_dry_run().await.clone()
        } else {
            self.revalidate().clone()
        };
        if !report.is_publishable() {
            let errors: Vec<ValidationIssue> = report.errors().cloned().collect();
            log::warn!("publish of {} blocked by {} error(s)", self.asset_id, errors.len());
            return Err(EditorError::ValidationFailed { errors });
        }
        if self.draft_modified {
            self.save_draft().await?;
        }
        let response = self.store.publish(&self.asset_id).await?;
        self.document.status = ScreenStatus::Published;
        self.document.version = response.version;
        self.baseline = self.document.clone();
        self.published = Some(self.document.clone());
        self.draft_modified = false;
        self.history.clear();
        self.proposal = None;
        self.proposal_state = ProposalState::Idle;
        log::info!("published {} as version {}", self.asset_id, response.version);
        Ok(response.version)
    }

    /// Reopen a published screen as an editable draft.
    pub async fn rollback(&mut self) -> Result<(), EditorError> {
        if self.document.status != ScreenStatus::Published {
            return Err(EditorError::NotPublished);
        }
        let response = self.store.rollback(&self.asset_id).await?;
        self.reset_to(response.draft, response.revision);
        log::info!("rolled back {} to an editable draft", self.asset_id);
        Ok(())
    }

    /// Discard all local state and reload from the store.
    pub async fn reload_from_server(&mut self) -> Result<(), EditorError> {
        let loaded = self.store.load_screen(&self.asset_id).await?;
        self.published = loaded.published;
        self.reset_to(loaded.draft, loaded.revision);
        log::info!("reloaded {} at revision {}", self.asset_id, self.revision);
        Ok(())
    }

    fn reset_to(&mut self, draft: ScreenDocument, revision: u64) {
        self.baseline = draft.clone();
        self.document = draft;
        self.revision = revision;
        self.history.clear();
        self.selection.clear();
        self.proposal = None;
        self.proposal_state = ProposalState::Idle;
        self.conflict = DraftConflict::default();
        self.draft_modified = false;
        self.revalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use sd_core::error::TreeError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn session() -> EditorSession<MemoryStore> {
        let doc = ScreenDocument::from_json(
            r#"{ "id": "a1", "screenId": "orders", "name": "Orders", "components": [
                { "id": "hdr", "type": "text", "props": { "content": "Orders" } }
            ] }"#,
        )
        .unwrap();
        let loaded = LoadedScreen {
            draft: doc.clone(),
            published: None,
            revision: 1,
        };
        let store = MemoryStore::new().with_screen("a1", doc);
        EditorSession::new(store, "a1", loaded, SessionConfig::default(), ValidationContext::default())
    }

    #[test]
    fn edits_mark_modified_and_record_history() {
        let mut s = session();
        assert!(!s.is_draft_modified());
        let id = s.add_component("button", None).unwrap();
        assert!(s.is_draft_modified());
        assert!(s.can_undo());
        assert_eq!(s.selection().primary(), Some(id));
        assert_eq!(s.undo().unwrap().as_deref(), Some("add button"));
        assert!(!s.document().contains(id));
        assert_eq!(s.selection().primary(), None);
    }

    #[test]
    fn failed_edit_records_nothing() {
        let mut s = session();
        let before = s.document().clone();
        let err = s.add_component("hologram", None).unwrap_err();
        assert_eq!(err, EditorError::Tree(TreeError::UnsupportedType("hologram".into())));
        assert_eq!(s.document(), &before);
        assert!(!s.can_undo());
        assert!(!s.is_draft_modified());
    }

    #[test]
    fn boundary_move_is_not_an_edit() {
        let mut s = session();
        let hdr = ComponentId::intern("hdr");
        assert_eq!(s.move_component(hdr, MoveDirection::Up), Ok(false));
        assert!(!s.can_undo());
    }

    #[test]
    fn proposal_state_machine() {
        let mut s = session();
        assert_eq!(s.proposal_state(), ProposalState::Idle);
        s.propose_patch(vec![PatchOperation::replace("/name", json!("Sales"))], None)
            .unwrap();
        assert_eq!(s.proposal_state(), ProposalState::Proposed);
        assert_eq!(s.preview_proposed_patch().unwrap().name, "Sales");
        assert_eq!(s.proposal_state(), ProposalState::Previewed);
        assert_eq!(s.document().name, "Orders");
        s.apply_proposed_patch().unwrap();
        assert_eq!(s.proposal_state(), ProposalState::Applied);
        assert_eq!(s.document().name, "Sales");
        assert!(s.is_draft_modified());

        s.propose_patch(vec![PatchOperation::remove("/components/0")], None)
            .unwrap();
        s.discard_proposed_patch().unwrap();
        assert_eq!(s.proposal_state(), ProposalState::Discarded);
        assert_eq!(s.document().components.len(), 1);
        assert_eq!(s.discard_proposed_patch(), Err(EditorError::NoProposedPatch));
    }

    #[test]
    fn invalid_proposal_is_rejected() {
        let mut s = session();
        let bad = vec![PatchOperation {
            op: sd_core::patch::PatchOp::Add,
            path: "/components/-".into(),
            from: None,
            value: None,
        }];
        assert!(matches!(
            s.propose_patch(bad, None),
            Err(EditorError::Patch(PatchError::Invalid(_)))
        ));
        assert_eq!(s.proposal_state(), ProposalState::Idle);
    }

    #[test]
    fn second_save_while_pending_fails() {
        let mut s = session();
        let request = s.begin_save().unwrap();
        assert!(s.is_saving());
        assert_eq!(s.begin_save(), Err(EditorError::SaveInProgress));
        s.finish_save(request, Ok(SaveResponse { revision: 2 })).unwrap();
        assert!(!s.is_saving());
        assert_eq!(s.revision(), 2);
    }

    #[test]
    fn edits_during_save_stay_modified() {
        let mut s = session();
        s.add_component("divider", None).unwrap();
        let request = s.begin_save().unwrap();
        s.add_component("spacer", None).unwrap();
        s.finish_save(request, Ok(SaveResponse { revision: 2 })).unwrap();
        assert!(s.is_draft_modified());
    }

    #[test]
    fn dispatch_shortcuts() {
        let mut s = session();
        let hdr = ComponentId::intern("hdr");
        s.select(hdr);
        assert_eq!(s.dispatch(ShortcutAction::Duplicate), Ok(true));
        assert_eq!(s.document().components.len(), 2);
        assert_eq!(s.dispatch(ShortcutAction::Undo), Ok(true));
        assert_eq!(s.document().components.len(), 1);
        assert_eq!(s.dispatch(ShortcutAction::Save), Ok(false));
        assert_eq!(s.dispatch(ShortcutAction::SelectAll), Ok(true));
        assert_eq!(s.dispatch(ShortcutAction::Delete), Ok(true));
        assert!(s.document().components.is_empty());
    }
}
