//! Undo/Redo history.
//!
//! Every committed edit pushes a full snapshot of the document as it was
//! before the edit. Screen documents are small, so snapshots are cheaper to
//! reason about than inverse operations.
//!
//! Drag gestures use **batching**: the document is captured when the batch
//! opens, and closing it pushes a single entry if anything changed.

use sd_core::model::ScreenDocument;

/// Default maximum number of undo steps.
pub const DEFAULT_DEPTH: usize = 100;

/// A document snapshot plus a human-readable label for the edit.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub snapshot: ScreenDocument,
    pub description: String,
}

/// Past/future stacks with bounded depth and batch grouping.
#[derive(Debug, Clone)]
pub struct History {
    past: Vec<HistoryEntry>,
    future: Vec<HistoryEntry>,
    max_depth: usize,
    /// Batch nesting depth (0 = not batching).
    batch_depth: usize,
    /// Document captured when the outermost batch opened.
    batch_snapshot: Option<HistoryEntry>,
    /// Whether any edit was recorded inside the current batch.
    batch_dirty: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_DEPTH)
    }
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            past: Vec::with_capacity(max_depth.min(DEFAULT_DEPTH)),
            future: Vec::new(),
            max_depth: max_depth.max(1),
            batch_depth: 0,
            batch_snapshot: None,
            batch_dirty: false,
        }
    }

    fn push_past(&mut self, entry: HistoryEntry) {
        self.past.push(entry);
        if self.past.len() > self.max_depth {
            self.past.remove(0);
        }
        self.future.clear();
    }

    /// Record the document as it was before an edit. Inside a batch this
    /// only marks the batch dirty.
    pub fn record(&mut self, before: ScreenDocument, description: &str) {
        if self.batch_depth > 0 {
            self.batch_dirty = true;
            return;
        }
        log::debug!("history: {description}");
        self.push_past(HistoryEntry {
            snapshot: before,
            description: description.to_string(),
        });
    }

    /// Start a batch group. Nested calls join the outermost batch.
    pub fn begin_batch(&mut self, current: &ScreenDocument, description: &str) {
        if self.batch_depth == 0 {
            self.batch_snapshot = Some(HistoryEntry {
                snapshot: current.clone(),
                description: description.to_string(),
            });
            self.batch_dirty = false;
        }
        self.batch_depth += 1;
    }

    /// End a batch group. When the outermost batch closes, one entry is
    /// pushed if the document actually changed.
    pub fn end_batch(&mut self, current: &ScreenDocument) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return;
        }
        if let Some(entry) = self.batch_snapshot.take()
            && self.batch_dirty
            && entry.snapshot != *current
        {
            log::debug!("history: {} (batch)", entry.description);
            self.push_past(entry);
        }
        self.batch_dirty = false;
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    fn cancel_batch(&mut self) {
        self.batch_depth = 0;
        self.batch_snapshot = None;
        self.batch_dirty = false;
    }

    /// Close every open batch level, keeping its edits as one entry.
    fn close_batch(&mut self, current: &ScreenDocument) {
        if self.batch_depth > 0 {
            self.batch_depth = 1;
            self.end_batch(current);
        }
    }

    /// Restore the previous snapshot into `current`. Returns the description
    /// of the undone edit, or `None` when there is nothing to undo. An open
    /// batch is closed first, so its edits are undone as one step.
    pub fn undo(&mut self, current: &mut ScreenDocument) -> Option<String> {
        self.close_batch(current);
        let entry = self.past.pop()?;
        let after = std::mem::replace(current, entry.snapshot);
        self.future.push(HistoryEntry {
            snapshot: after,
            description: entry.description.clone(),
        });
        Some(entry.description)
    }

    /// Re-apply the last undone edit.
    pub fn redo(&mut self, current: &mut ScreenDocument) -> Option<String> {
        self.close_batch(current);
        let entry = self.future.pop()?;
        let before = std::mem::replace(current, entry.snapshot);
        self.past.push(HistoryEntry {
            snapshot: before,
            description: entry.description.clone(),
        });
        Some(entry.description)
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.past.last().map(|e| e.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.future.last().map(|e| e.description.as_str())
    }

    pub fn past(&self) -> &[HistoryEntry] {
        &self.past
    }

    pub fn future(&self) -> &[HistoryEntry] {
        &self.future
    }

    /// Drop all entries (after load, reload, publish, rollback).
    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.cancel_batch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn doc(name: &str) -> ScreenDocument {
        ScreenDocument::new("d", "s", name)
    }

    #[test]
    fn undo_redo_swaps_snapshots() {
        let mut h = History::new(10);
        let mut current = doc("b");
        h.record(doc("a"), "rename");
        assert_eq!(h.undo(&mut current).as_deref(), Some("rename"));
        assert_eq!(current.name, "a");
        assert!(h.can_redo());
        assert_eq!(h.redo(&mut current).as_deref(), Some("rename"));
        assert_eq!(current.name, "b");
        assert!(!h.can_redo());
    }

    #[test]
    fn empty_stacks_are_noops() {
        let mut h = History::default();
        let mut current = doc("a");
        assert_eq!(h.undo(&mut current), None);
        assert_eq!(h.redo(&mut current), None);
        assert_eq!(current.name, "a");
    }

    #[test]
    fn record_clears_future() {
        let mut h = History::new(10);
        let mut current = doc("b");
        h.record(doc("a"), "first");
        h.undo(&mut current);
        h.record(doc("a"), "second");
        assert!(!h.can_redo());
        assert_eq!(h.undo_description(), Some("second"));
    }

    #[test]
    fn depth_is_bounded() {
        let mut h = History::new(3);
        for i in 0..5 {
            h.record(doc(&i.to_string()), &format!("edit {i}"));
        }
        assert_eq!(h.past().len(), 3);
        assert_eq!(h.past()[0].snapshot.name, "2");
    }

    #[test]
    fn batch_collapses_to_one_entry() {
        let mut h = History::new(10);
        let start = doc("start");
        h.begin_batch(&start, "drag");
        h.record(doc("start"), "step 1");
        h.begin_batch(&start, "nested");
        h.record(doc("mid"), "step 2");
        h.end_batch(&doc("mid"));
        assert!(h.is_batching());
        h.end_batch(&doc("end"));
        assert_eq!(h.past().len(), 1);
        assert_eq!(h.undo_description(), Some("drag"));
        assert_eq!(h.past()[0].snapshot.name, "start");
    }

    #[test]
    fn empty_batch_leaves_no_entry() {
        let mut h = History::new(10);
        let start = doc("start");
        h.begin_batch(&start, "drag");
        h.end_batch(&start);
        assert!(!h.can_undo());

        h.begin_batch(&start, "drag");
        h.record(start.clone(), "noop");
        h.end_batch(&start);
        assert!(!h.can_undo());
    }

    #[test]
    fn undo_inside_batch_closes_it_first() {
        let mut h = History::new(10);
        h.record(doc("loaded"), "rename A");
        let mut current = doc("a");
        h.begin_batch(&current, "drag");
        h.record(current.clone(), "rename B");
        current = doc("b");

        assert_eq!(h.undo(&mut current).as_deref(), Some("drag"));
        assert!(!h.is_batching());
        assert_eq!(current.name, "a");
        assert_eq!(h.undo(&mut current).as_deref(), Some("rename A"));
        assert_eq!(current.name, "loaded");
    }

    #[test]
    fn redo_inside_clean_batch_keeps_future() {
        let mut h = History::new(10);
        let mut current = doc("b");
        h.record(doc("a"), "rename");
        h.undo(&mut current);
        h.begin_batch(&current, "drag");
        assert_eq!(h.redo(&mut current).as_deref(), Some("rename"));
        assert_eq!(current.name, "b");
    }
}
