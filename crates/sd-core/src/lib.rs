pub mod binding;
pub mod error;
pub mod id;
pub mod merge;
pub mod model;
pub mod patch;
pub mod tree;
pub mod validate;

pub use binding::{BindingScope, PathTreeNode, build_path_tree, parse_binding_expression, validate_binding_path};
pub use error::{PatchError, PatchIssue, PatchIssueKind, TreeError};
pub use id::ComponentId;
pub use merge::three_way_merge;
pub use model::*;
pub use patch::{PatchEnvelope, PatchOp, PatchOperation, apply_patch, parse_patch, validate_patch_array, validate_patch_value};
pub use tree::MoveDirection;
pub use validate::{HandlerCatalog, Severity, ValidationContext, ValidationIssue, ValidationReport, validate_document};
