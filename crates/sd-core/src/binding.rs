//! Binding expressions: `{{state.foo.bar}}`, `{{context.x}}`,
//! `{{inputs.y}}`, `{{trace_id}}`.
//!
//! Only strings fully wrapped in `{{ … }}` are bindings; everything else is a
//! static value. Paths are checked against per-source path trees, which are
//! also what path-picker UIs navigate.

use crate::model::ScreenDocument;
use serde_json::Value;
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;
use winnow::ascii::multispace0;
use winnow::combinator::{delimited, preceded, repeat};
use winnow::prelude::*;
use winnow::token::take_while;

// ─── Expressions ─────────────────────────────────────────────────────────

/// Where a binding reads its value from at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingSource {
    State,
    Context,
    Inputs,
    TraceId,
}

impl BindingSource {
    pub fn parse(head: &str) -> Option<Self> {
        match head {
            "state" => Some(Self::State),
            "context" => Some(Self::Context),
            "inputs" => Some(Self::Inputs),
            "trace_id" => Some(Self::TraceId),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Context => "context",
            Self::Inputs => "inputs",
            Self::TraceId => "trace_id",
        }
    }
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed binding expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingExpr {
    pub source: BindingSource,
    pub path: SmallVec<[String; 4]>,
}

impl BindingExpr {
    /// The path below the source, dot-joined (`foo.bar`).
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

impl fmt::Display for BindingExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{{{{{}}}}}", self.source)
        } else {
            write!(f, "{{{{{}.{}}}}}", self.source, self.dotted_path())
        }
    }
}

fn segment<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-').parse_next(input)
}

fn dotted<'a>(input: &mut &'a str) -> ModalResult<(&'a str, Vec<&'a str>)> {
    let head = segment.parse_next(input)?;
    let rest: Vec<&str> = repeat(0.., preceded('.', segment)).parse_next(input)?;
    Ok((head, rest))
}

fn wrapped<'a>(input: &mut &'a str) -> ModalResult<(&'a str, Vec<&'a str>)> {
    delimited(("{{", multispace0), dotted, (multispace0, "}}")).parse_next(input)
}

/// Split a fully wrapped `{{head.a.b}}` into head and segments, whatever
/// the head is.
fn split_wrapped(text: &str) -> Option<(&str, Vec<&str>)> {
    let mut input = text;
    let parsed = wrapped.parse_next(&mut input).ok()?;
    input.is_empty().then_some(parsed)
}

/// Parse a binding expression. Returns `None` for static values and for
/// wrapped expressions whose source is not supported.
pub fn parse_binding_expression(text: &str) -> Option<BindingExpr> {
    let (head, rest) = split_wrapped(text)?;
    let source = BindingSource::parse(head)?;
    Some(BindingExpr {
        source,
        path: rest.into_iter().map(str::to_string).collect(),
    })
}

/// Whether `text` is syntactically a binding (any source).
pub fn is_binding_expression(text: &str) -> bool {
    split_wrapped(text).is_some()
}

/// Whether `text` looks like it tried to be a binding but is not one
/// (contains `{{` without being a well-formed wrapped expression).
pub fn is_partial_binding(text: &str) -> bool {
    text.contains("{{") && !is_binding_expression(text)
}

/// Whether any string anywhere inside `value` is a binding expression.
pub fn contains_binding(value: &Value) -> bool {
    match value {
        Value::String(s) => is_binding_expression(s),
        Value::Array(items) => items.iter().any(contains_binding),
        Value::Object(map) => map.values().any(contains_binding),
        _ => false,
    }
}

// ─── Path trees ──────────────────────────────────────────────────────────

/// A node in a navigable path hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTreeNode {
    /// Last segment of the path.
    pub key: String,
    /// Full dotted path from the tree root.
    pub path: String,
    pub children: Vec<PathTreeNode>,
}

/// Group flat dotted paths into a hierarchy. Siblings keep first-seen order.
#[must_use]
pub fn build_path_tree<S: AsRef<str>>(paths: &[S]) -> Vec<PathTreeNode> {
    let mut roots: Vec<PathTreeNode> = Vec::new();
    for path in paths {
        let mut level = &mut roots;
        let mut prefix = String::new();
        for seg in path.as_ref().split('.').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(seg);
            let pos = match level.iter().position(|n| n.key == seg) {
                Some(pos) => pos,
                None => {
                    level.push(PathTreeNode {
                        key: seg.to_string(),
                        path: prefix.clone(),
                        children: Vec::new(),
                    });
                    level.len() - 1
                }
            };
            level = &mut level[pos].children;
        }
    }
    roots
}

/// Whether `segments` names a node in `tree`. Numeric segments index into
/// arrays and are skipped.
pub fn tree_contains<S: AsRef<str>>(tree: &[PathTreeNode], segments: &[S]) -> bool {
    let mut level = tree;
    let mut matched = false;
    for seg in segments {
        let seg = seg.as_ref();
        if seg.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        match level.iter().find(|n| n.key == seg) {
            Some(node) => {
                level = &node.children;
                matched = true;
            }
            None => return false,
        }
    }
    matched
}

/// Flatten a structural state description into dotted paths.
///
/// Understands JSON-schema style (`properties`, `items`, leaf `type`) and
/// plain nested objects (`{ "user": { "name": "string" } }`).
#[must_use]
pub fn schema_paths(schema: &Value) -> Vec<String> {
    let mut out = Vec::new();
    collect_schema_paths(schema, "", &mut out);
    out
}

fn collect_schema_paths(schema: &Value, prefix: &str, out: &mut Vec<String>) {
    let Value::Object(map) = schema else {
        return;
    };
    if let Some(Value::Object(props)) = map.get("properties") {
        for (key, child) in props {
            let path = join_path(prefix, key);
            out.push(path.clone());
            collect_schema_paths(child, &path, out);
        }
    } else if let Some(items) = map.get("items") {
        collect_schema_paths(items, prefix, out);
    } else if map.get("type").is_some_and(Value::is_string) {
        // JSON-schema leaf
    } else {
        for (key, child) in map {
            let path = join_path(prefix, key);
            out.push(path.clone());
            collect_schema_paths(child, &path, out);
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

// ─── Resolution ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("unknown binding source `{0}` (expected state, context, inputs, or trace_id)")]
    UnknownSource(String),
    #[error("binding path `{0}` does not resolve")]
    UnresolvedPath(String),
    #[error("malformed binding expression `{0}`")]
    Malformed(String),
    #[error("no paths declared for `{0}`; `{1}` cannot be checked")]
    UndeclaredSource(BindingSource, String),
}

/// Path trees for every binding source.
///
/// `state` always comes from the document's `state.schema`. `context` and
/// `inputs` are supplied by the host; `None` means "not declared", which
/// turns failed lookups into unverifiable bindings instead of errors.
#[derive(Debug, Clone, Default)]
pub struct BindingScope {
    pub state: Vec<PathTreeNode>,
    pub context: Option<Vec<PathTreeNode>>,
    pub inputs: Option<Vec<PathTreeNode>>,
}

impl BindingScope {
    pub fn for_document(doc: &ScreenDocument) -> Self {
        Self {
            state: build_path_tree(&schema_paths(&doc.state.schema)),
            context: None,
            inputs: None,
        }
    }

    #[must_use]
    pub fn with_context<S: AsRef<str>>(mut self, paths: &[S]) -> Self {
        self.context = Some(build_path_tree(paths));
        self
    }

    #[must_use]
    pub fn with_inputs<S: AsRef<str>>(mut self, paths: &[S]) -> Self {
        self.inputs = Some(build_path_tree(paths));
        self
    }

    fn tree(&self, source: BindingSource) -> Option<&[PathTreeNode]> {
        match source {
            BindingSource::State => Some(&self.state),
            BindingSource::Context => self.context.as_deref(),
            BindingSource::Inputs => self.inputs.as_deref(),
            BindingSource::TraceId => Some(&[]),
        }
    }
}

/// Check a binding expression against the scope. Static values (anything not
/// wrapped in `{{ }}`) produce no errors.
pub fn validate_binding_path(expr: &str, scope: &BindingScope) -> Vec<BindingError> {
    let Some((head, rest)) = split_wrapped(expr) else {
        let trimmed = expr.trim();
        if trimmed.starts_with("{{") && trimmed.ends_with("}}") {
            return vec![BindingError::Malformed(expr.to_string())];
        }
        return Vec::new();
    };
    let Some(source) = BindingSource::parse(head) else {
        return vec![BindingError::UnknownSource(head.to_string())];
    };
    if source == BindingSource::TraceId {
        return if rest.is_empty() {
            Vec::new()
        } else {
            vec![BindingError::UnresolvedPath(expr.to_string())]
        };
    }
    match scope.tree(source) {
        None => vec![BindingError::UndeclaredSource(source, expr.to_string())],
        Some(tree) if tree_contains(tree, &rest) => Vec::new(),
        Some(_) => vec![BindingError::UnresolvedPath(expr.to_string())],
    }
}
