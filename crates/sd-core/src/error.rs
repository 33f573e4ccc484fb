use crate::id::ComponentId;
use thiserror::Error;

/// A mutation that would break a tree invariant. The document is left
/// unchanged whenever one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("unsupported component type `{0}`")]
    UnsupportedType(String),

    #[error("component not found: {0}")]
    NotFound(ComponentId),

    #[error("component {0} cannot hold children")]
    NotAContainer(ComponentId),

    #[error("cannot move {id} into {target}: target is the component itself or one of its descendants")]
    CyclicMove { id: ComponentId, target: ComponentId },

    #[error("duplicate component id: {0}")]
    DuplicateId(ComponentId),

    #[error("component {component} already has an action `{action}`")]
    DuplicateActionId {
        component: ComponentId,
        action: String,
    },

    #[error("component {component} has no action `{action}`")]
    ActionNotFound {
        component: ComponentId,
        action: String,
    },

    #[error("prop `{0}` is reserved for nested children")]
    ReservedProp(String),
}

/// What is structurally wrong with one patch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchIssueKind {
    NotAnArray,
    NotAnObject,
    UnknownOp,
    InvalidPath,
    ProtectedPath,
    MissingValue,
    MissingFrom,
    DisallowedType,
}

/// A structural problem with a patch operation, reported before anything is
/// applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("operation {index} ({path}): {message}")]
pub struct PatchIssue {
    pub index: usize,
    pub path: String,
    pub kind: PatchIssueKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    /// Structural validation failed; nothing was applied.
    #[error("patch rejected with {} structural issue(s)", .0.len())]
    Invalid(Vec<PatchIssue>),

    /// An operation could not be applied to the document.
    #[error("operation {index} ({path}) failed: {reason}")]
    Apply {
        index: usize,
        path: String,
        reason: String,
    },

    #[error("test operation {index} failed at {path}")]
    TestFailed { index: usize, path: String },

    /// The patched JSON is no longer a valid screen document.
    #[error("patched document is invalid: {0}")]
    Decode(String),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("malformed patch envelope: {0}")]
    Envelope(String),
}
