use crate::store::StoreError;
use sd_core::error::{PatchError, TreeError};
use sd_core::validate::ValidationIssue;
use thiserror::Error;

/// Failures surfaced by an [`EditorSession`](crate::session::EditorSession).
/// A failed operation never leaves the working document partially changed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditorError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("published screens are read-only; roll back to edit")]
    ReadOnly,

    #[error("only drafts can be saved or published")]
    NotDraft,

    #[error("only published screens can be rolled back")]
    NotPublished,

    #[error("{} validation error(s) block publishing", errors.len())]
    ValidationFailed { errors: Vec<ValidationIssue> },

    #[error("save conflict: {message}")]
    ConflictDetected { message: String },

    #[error("a save is already in progress")]
    SaveInProgress,

    #[error("no proposed patch")]
    NoProposedPatch,

    #[error("no auto-merged draft is available")]
    NoAutoMerge,
}
