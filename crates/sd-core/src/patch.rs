//! JSON Patch (RFC 6902) over screen documents.
//!
//! Patches address the wire shape of a document (children under
//! `props.components`). Application is atomic: the whole array is checked
//! structurally first, then applied to a JSON copy, decoded back into the
//! typed model and re-checked. The input document is never touched.

use crate::error::{PatchError, PatchIssue, PatchIssueKind};
use crate::model::{CHILDREN_PROP, Component, ComponentType, ScreenDocument};
use crate::tree::check_tree_invariants;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Document fields a patch may not touch. Identity and lifecycle are owned
/// by the versioning layer.
const PROTECTED_PATHS: [&str; 4] = ["/id", "/screenId", "/version", "/status"];

/// Envelope `type` tag for patches produced by the copilot.
pub const ENVELOPE_TYPE: &str = "screen_patch";

// ─── Operations ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Move,
    Copy,
    Test,
}

impl PatchOp {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Self::Add),
            "remove" => Some(Self::Remove),
            "replace" => Some(Self::Replace),
            "move" => Some(Self::Move),
            "copy" => Some(Self::Copy),
            "test" => Some(Self::Test),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Test => "test",
        }
    }

    fn needs_value(&self) -> bool {
        matches!(self, Self::Add | Self::Replace | Self::Test)
    }

    fn needs_from(&self) -> bool {
        matches!(self, Self::Move | Self::Copy)
    }
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// `Some(Value::Null)` is an explicit `null`; `None` means absent.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
}

fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl PatchOperation {
    pub fn add(path: &str, value: Value) -> Self {
        Self::with_value(PatchOp::Add, path, value)
    }

    pub fn replace(path: &str, value: Value) -> Self {
        Self::with_value(PatchOp::Replace, path, value)
    }

    pub fn test(path: &str, value: Value) -> Self {
        Self::with_value(PatchOp::Test, path, value)
    }

    pub fn remove(path: &str) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.to_string(),
            from: None,
            value: None,
        }
    }

    pub fn move_from(from: &str, path: &str) -> Self {
        Self::with_from(PatchOp::Move, from, path)
    }

    pub fn copy_from(from: &str, path: &str) -> Self {
        Self::with_from(PatchOp::Copy, from, path)
    }

    fn with_value(op: PatchOp, path: &str, value: Value) -> Self {
        Self {
            op,
            path: path.to_string(),
            from: None,
            value: Some(value),
        }
    }

    fn with_from(op: PatchOp, from: &str, path: &str) -> Self {
        Self {
            op,
            path: path.to_string(),
            from: Some(from.to_string()),
            value: None,
        }
    }
}

/// A copilot reply: `{ "type": "screen_patch", "patch": [...], "notes": "..." }`.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchEnvelope {
    pub patch: Vec<PatchOperation>,
    pub notes: Option<String>,
}

impl PatchEnvelope {
    /// Parse and structurally check an envelope from untrusted JSON text.
    pub fn parse(text: &str) -> Result<Self, PatchError> {
        let raw: Value =
            serde_json::from_str(text).map_err(|e| PatchError::Envelope(e.to_string()))?;
        Self::from_value(&raw)
    }

    pub fn from_value(raw: &Value) -> Result<Self, PatchError> {
        let Value::Object(map) = raw else {
            return Err(PatchError::Envelope("expected a JSON object".into()));
        };
        match map.get("type").and_then(Value::as_str) {
            Some(ENVELOPE_TYPE) => {}
            Some(other) => {
                return Err(PatchError::Envelope(format!(
                    "unexpected type `{other}`, expected `{ENVELOPE_TYPE}`"
                )));
            }
            None => return Err(PatchError::Envelope("missing `type`".into())),
        }
        let patch = map
            .get("patch")
            .ok_or_else(|| PatchError::Envelope("missing `patch`".into()))?;
        let notes = map.get("notes").and_then(Value::as_str).map(str::to_string);
        Ok(Self {
            patch: parse_patch(patch)?,
            notes,
        })
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("type".into(), Value::String(ENVELOPE_TYPE.into()));
        map.insert(
            "patch".into(),
            serde_json::to_value(&self.patch).unwrap_or(Value::Array(Vec::new())),
        );
        if let Some(notes) = &self.notes {
            map.insert("notes".into(), Value::String(notes.clone()));
        }
        Value::Object(map)
    }
}

// ─── Structural validation ───────────────────────────────────────────────

fn issue(index: usize, path: &str, kind: PatchIssueKind, message: impl Into<String>) -> PatchIssue {
    PatchIssue {
        index,
        path: path.to_string(),
        kind,
        message: message.into(),
    }
}

/// Check untrusted JSON before decoding it into operations. Every problem is
/// reported, not just the first.
pub fn validate_patch_value(raw: &Value) -> Vec<PatchIssue> {
    let Value::Array(items) = raw else {
        return vec![issue(0, "", PatchIssueKind::NotAnArray, "patch must be a JSON array")];
    };
    let mut issues = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let Value::Object(map) = item else {
            issues.push(issue(index, "", PatchIssueKind::NotAnObject, "operation must be an object"));
            continue;
        };
        let path = map.get("path").and_then(Value::as_str);
        let shown = path.unwrap_or("");
        let op_name = map.get("op").and_then(Value::as_str).unwrap_or("");
        let Some(op) = PatchOp::parse(op_name) else {
            issues.push(issue(
                index,
                shown,
                PatchIssueKind::UnknownOp,
                format!("unknown op `{op_name}`"),
            ));
            continue;
        };
        let Some(path) = path else {
            issues.push(issue(index, "", PatchIssueKind::InvalidPath, "`path` must be a string"));
            continue;
        };
        let from = match map.get("from") {
            None => None,
            Some(Value::String(from)) => Some(from.as_str()),
            Some(_) => {
                issues.push(issue(index, path, PatchIssueKind::MissingFrom, "`from` must be a string"));
                continue;
            }
        };
        check_operation(index, op, path, from, map.get("value"), &mut issues);
    }
    issues
}

/// Check already-decoded operations.
pub fn validate_patch_array(ops: &[PatchOperation]) -> Vec<PatchIssue> {
    let mut issues = Vec::new();
    for (index, op) in ops.iter().enumerate() {
        check_operation(
            index,
            op.op,
            &op.path,
            op.from.as_deref(),
            op.value.as_ref(),
            &mut issues,
        );
    }
    issues
}

/// Validate raw JSON and decode it into operations.
pub fn parse_patch(raw: &Value) -> Result<Vec<PatchOperation>, PatchError> {
    let issues = validate_patch_value(raw);
    if !issues.is_empty() {
        return Err(PatchError::Invalid(issues));
    }
    serde_json::from_value(raw.clone()).map_err(|e| PatchError::Decode(e.to_string()))
}

fn check_operation(
    index: usize,
    op: PatchOp,
    path: &str,
    from: Option<&str>,
    value: Option<&Value>,
    issues: &mut Vec<PatchIssue>,
) {
    if !path.starts_with('/') {
        issues.push(issue(
            index,
            path,
            PatchIssueKind::InvalidPath,
            "path must start with `/`",
        ));
        return;
    }
    if op != PatchOp::Test && is_protected(path) {
        issues.push(issue(
            index,
            path,
            PatchIssueKind::ProtectedPath,
            "document identity and lifecycle fields cannot be patched",
        ));
    }
    if op.needs_value() && value.is_none() {
        issues.push(issue(
            index,
            path,
            PatchIssueKind::MissingValue,
            format!("`{op}` requires a `value`"),
        ));
    }
    if op.needs_from() {
        match from {
            None => issues.push(issue(
                index,
                path,
                PatchIssueKind::MissingFrom,
                format!("`{op}` requires a `from`"),
            )),
            Some(from) if !from.starts_with('/') => issues.push(issue(
                index,
                path,
                PatchIssueKind::InvalidPath,
                "`from` must start with `/`",
            )),
            Some(from) if op == PatchOp::Move && is_protected(from) => issues.push(issue(
                index,
                path,
                PatchIssueKind::ProtectedPath,
                "document identity and lifecycle fields cannot be moved",
            )),
            Some(_) => {}
        }
    }
    if let Some(value) = value {
        check_component_types(index, path, value, issues);
    }
}

fn is_protected(path: &str) -> bool {
    PROTECTED_PATHS
        .iter()
        .any(|p| path == *p || path.strip_prefix(p).is_some_and(|rest| rest.starts_with('/')))
}

fn is_index_segment(seg: &str) -> bool {
    seg == "-" || (!seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()))
}

/// What kind of value a pointer writes, as far as component types go.
enum Target {
    /// A list of components (`/components`, `.../props/components`).
    ComponentList,
    /// A single component slot in such a list.
    Component,
    /// The `type` field of a component.
    TypeField,
    /// The `props` object of a component, which may carry children.
    Props,
    Other,
}

fn classify_target(path: &str) -> Target {
    let segs = pointer_segments(path);
    let n = segs.len();
    let is_list = |i: usize| segs[i] == CHILDREN_PROP && (i == 0 || segs[i - 1] == "props");
    match n {
        0 => Target::Other,
        _ if is_list(n - 1) => Target::ComponentList,
        _ if n >= 2 && is_index_segment(&segs[n - 1]) && is_list(n - 2) => Target::Component,
        _ if n >= 3
            && segs[n - 1] == "type"
            && is_index_segment(&segs[n - 2])
            && is_list(n - 3) =>
        {
            Target::TypeField
        }
        _ if n >= 3
            && segs[n - 1] == "props"
            && is_index_segment(&segs[n - 2])
            && is_list(n - 3) =>
        {
            Target::Props
        }
        _ => Target::Other,
    }
}

fn check_component_types(index: usize, path: &str, value: &Value, issues: &mut Vec<PatchIssue>) {
    match classify_target(path) {
        Target::ComponentList => {
            if let Value::Array(items) = value {
                for item in items {
                    check_component_value(index, path, item, issues);
                }
            }
        }
        Target::Component => check_component_value(index, path, value, issues),
        Target::TypeField => check_type_name(index, path, value, issues),
        Target::Props => check_children(index, path, value, issues),
        Target::Other => {}
    }
}

fn check_component_value(index: usize, path: &str, value: &Value, issues: &mut Vec<PatchIssue>) {
    let Value::Object(map) = value else {
        return;
    };
    if let Some(kind) = map.get("type") {
        check_type_name(index, path, kind, issues);
    }
    if let Some(props) = map.get("props") {
        check_children(index, path, props, issues);
    }
}

/// Check the children a `props` object carries, at any depth.
fn check_children(index: usize, path: &str, props: &Value, issues: &mut Vec<PatchIssue>) {
    if let Some(Value::Array(children)) = props.get(CHILDREN_PROP) {
        for child in children {
            check_component_value(index, path, child, issues);
        }
    }
}

fn check_type_name(index: usize, path: &str, kind: &Value, issues: &mut Vec<PatchIssue>) {
    let name = kind.as_str().unwrap_or_default();
    if ComponentType::parse(name).is_none() {
        issues.push(issue(
            index,
            path,
            PatchIssueKind::DisallowedType,
            format!("component type `{name}` is not allowed"),
        ));
    }
}

// ─── Pointer navigation ──────────────────────────────────────────────────

/// Split an RFC 6901 pointer into unescaped segments.
pub fn pointer_segments(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('/')
        .skip(1)
        .map(|seg| seg.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn escape_segment(seg: &str) -> String {
    seg.replace('~', "~0").replace('/', "~1")
}

fn to_pointer(segments: &[String]) -> String {
    segments.iter().map(|s| format!("/{}", escape_segment(s))).collect()
}

fn array_index(seg: &str, len: usize, allow_end: bool) -> Result<usize, String> {
    if seg == "-" {
        return if allow_end {
            Ok(len)
        } else {
            Err("`-` is only valid when adding".into())
        };
    }
    if !is_index_segment(seg) || (seg.len() > 1 && seg.starts_with('0')) {
        return Err(format!("`{seg}` is not an array index"));
    }
    let idx: usize = seg
        .parse()
        .map_err(|_| format!("`{seg}` is not an array index"))?;
    let in_bounds = if allow_end { idx <= len } else { idx < len };
    if !in_bounds {
        return Err(format!("index {idx} out of bounds (length {len})"));
    }
    Ok(idx)
}

fn empty_container_for(next: &str) -> Value {
    if is_index_segment(next) {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

/// Walk to the parent of the last segment. With `vivify`, missing object
/// keys and end-of-array slots are filled with empty containers shaped by
/// the next segment.
fn parent_mut<'a>(
    root: &'a mut Value,
    segments: &[String],
    vivify: bool,
) -> Result<&'a mut Value, String> {
    let mut current = root;
    for i in 0..segments.len().saturating_sub(1) {
        let seg = &segments[i];
        let next = &segments[i + 1];
        current = match current {
            Value::Object(map) => {
                if vivify && !map.contains_key(seg) {
                    map.insert(seg.clone(), empty_container_for(next));
                }
                map.get_mut(seg)
                    .ok_or_else(|| format!("no such key `{seg}`"))?
            }
            Value::Array(items) => {
                let len = items.len();
                let idx = array_index(seg, len, vivify)?;
                if idx == len {
                    items.push(empty_container_for(next));
                }
                &mut items[idx]
            }
            _ => return Err(format!("cannot descend into a scalar at `{seg}`")),
        };
    }
    Ok(current)
}

fn op_add(root: &mut Value, segments: &[String], value: Value) -> Result<(), String> {
    let Some(key) = segments.last() else {
        *root = value;
        return Ok(());
    };
    match parent_mut(root, segments, true)? {
        Value::Object(map) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let idx = array_index(key, items.len(), true)?;
            items.insert(idx, value);
            Ok(())
        }
        _ => Err("parent is not a container".into()),
    }
}

fn op_remove(root: &mut Value, segments: &[String]) -> Result<Value, String> {
    let Some(key) = segments.last() else {
        return Err("cannot remove the document root".into());
    };
    match parent_mut(root, segments, false)? {
        Value::Object(map) => map.remove(key).ok_or_else(|| format!("no such key `{key}`")),
        Value::Array(items) => {
            let idx = array_index(key, items.len(), false)?;
            Ok(items.remove(idx))
        }
        _ => Err("parent is not a container".into()),
    }
}

fn op_replace(root: &mut Value, segments: &[String], value: Value) -> Result<(), String> {
    let Some(key) = segments.last() else {
        *root = value;
        return Ok(());
    };
    match parent_mut(root, segments, false)? {
        Value::Object(map) => match map.get_mut(key) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(format!("no such key `{key}`")),
        },
        Value::Array(items) => {
            let idx = array_index(key, items.len(), false)?;
            items[idx] = value;
            Ok(())
        }
        _ => Err("parent is not a container".into()),
    }
}

fn apply_operation(root: &mut Value, op: &PatchOperation) -> Result<(), String> {
    let segments = pointer_segments(&op.path);
    let value = || op.value.clone().ok_or_else(|| "missing `value`".to_string());
    let from = || {
        op.from
            .as_deref()
            .map(pointer_segments)
            .ok_or_else(|| "missing `from`".to_string())
    };
    match op.op {
        PatchOp::Add => op_add(root, &segments, value()?),
        PatchOp::Remove => op_remove(root, &segments).map(|_| ()),
        PatchOp::Replace => op_replace(root, &segments, value()?),
        PatchOp::Move => {
            let from = from()?;
            if segments.len() > from.len() && segments[..from.len()] == from[..] {
                return Err("cannot move a value into one of its own children".into());
            }
            if segments == from {
                return Ok(());
            }
            let moved = op_remove(root, &from)?;
            op_add(root, &segments, moved)
        }
        PatchOp::Copy => {
            let from = from()?;
            let copied = root
                .pointer(&to_pointer(&from))
                .cloned()
                .ok_or_else(|| format!("nothing at `{}`", to_pointer(&from)))?;
            op_add(root, &segments, copied)
        }
        // Checked by the caller so it can report `TestFailed`.
        PatchOp::Test => Ok(()),
    }
}

fn refresh_binds(list: &mut [Component]) {
    for c in list {
        c.refresh_bind();
        refresh_binds(&mut c.children);
    }
}

// ─── Application ─────────────────────────────────────────────────────────

/// Apply `ops` to a copy of `doc`.
///
/// Returns the patched document, or an error describing the first failure;
/// `doc` itself is never modified.
pub fn apply_patch(doc: &ScreenDocument, ops: &[PatchOperation]) -> Result<ScreenDocument, PatchError> {
    let issues = validate_patch_array(ops);
    if !issues.is_empty() {
        log::warn!("rejecting patch with {} structural issue(s)", issues.len());
        return Err(PatchError::Invalid(issues));
    }

    let mut value = serde_json::to_value(doc).map_err(|e| PatchError::Decode(e.to_string()))?;
    for (index, op) in ops.iter().enumerate() {
        log::trace!("patch op {index}: {} {}", op.op, op.path);
        if op.op == PatchOp::Test {
            let expected = op.value.as_ref().unwrap_or(&Value::Null);
            if value.pointer(&op.path) != Some(expected) {
                log::warn!("patch test failed at {}", op.path);
                return Err(PatchError::TestFailed {
                    index,
                    path: op.path.clone(),
                });
            }
            continue;
        }
        apply_operation(&mut value, op).map_err(|reason| {
            log::warn!("patch op {index} ({} {}) failed: {reason}", op.op, op.path);
            PatchError::Apply {
                index,
                path: op.path.clone(),
                reason,
            }
        })?;
    }

    let mut patched: ScreenDocument =
        serde_json::from_value(value).map_err(|e| PatchError::Decode(e.to_string()))?;
    check_tree_invariants(&patched)?;
    refresh_binds(&mut patched.components);
    log::debug!("applied patch of {} operation(s)", ops.len());
    Ok(patched)
}

/// Apply a patch given as untrusted JSON.
pub fn apply_patch_value(doc: &ScreenDocument, raw: &Value) -> Result<ScreenDocument, PatchError> {
    let ops = parse_patch(raw)?;
    apply_patch(doc, &ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ComponentId;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc() -> ScreenDocument {
        ScreenDocument::from_json(
            r#"{ "id": "d", "screenId": "s", "name": "n", "title": "Old",
                "components": [
                    { "id": "hdr", "type": "text", "props": { "content": "Hi" } },
                    { "id": "row", "type": "row", "props": { "components": [
                        { "id": "cell", "type": "badge", "props": { "text": "x" } }
                    ] } }
                ] }"#,
        )
        .unwrap()
    }

    #[test]
    fn replace_title_twice_is_idempotent() {
        let ops = vec![PatchOperation::replace("/title", json!("Sales"))];
        let once = apply_patch(&doc(), &ops).unwrap();
        let twice = apply_patch(&once, &ops).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.extra.get("title"), Some(&json!("Sales")));
    }

    #[test]
    fn add_nested_child_and_append() {
        let ops = vec![
            PatchOperation::add(
                "/components/1/props/components/-",
                json!({ "id": "tail", "type": "text", "props": { "content": "{{state.x}}" } }),
            ),
            PatchOperation::add(
                "/components/1/props/components/0",
                json!({ "id": "head", "type": "divider" }),
            ),
        ];
        let out = apply_patch(&doc(), &ops).unwrap();
        let row = out.find(ComponentId::intern("row")).unwrap();
        let ids: Vec<&str> = row.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["head", "cell", "tail"]);
        assert!(out.find(ComponentId::intern("tail")).unwrap().bind);
    }

    #[test]
    fn add_vivifies_intermediates() {
        let ops = vec![PatchOperation::add("/meta/tags/-", json!("beta"))];
        let out = apply_patch(&doc(), &ops).unwrap();
        assert_eq!(out.extra.get("meta"), Some(&json!({ "tags": ["beta"] })));
    }

    #[test]
    fn escaped_segments() {
        let ops = vec![PatchOperation::add("/components/0/props/a~1b~0c", json!(1))];
        let out = apply_patch(&doc(), &ops).unwrap();
        assert_eq!(out.components[0].props.get("a/b~c"), Some(&json!(1)));
    }

    #[test]
    fn one_bad_op_rejects_everything() {
        let original = doc();
        let ops = vec![
            PatchOperation::replace("/title", json!("New")),
            PatchOperation {
                op: PatchOp::Add,
                path: "components/0".into(),
                from: None,
                value: None,
            },
        ];
        let err = apply_patch(&original, &ops).unwrap_err();
        let PatchError::Invalid(issues) = err else {
            panic!("expected structural rejection");
        };
        let kinds: Vec<PatchIssueKind> = issues.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![PatchIssueKind::InvalidPath]);
        assert_eq!(original, doc());
    }

    #[test]
    fn raw_validation_collects_all_issues() {
        let raw = json!([
            { "op": "explode", "path": "/x" },
            { "op": "add", "path": "/components/-" },
            { "op": "move", "path": "/a" },
            { "op": "add", "path": "/components/-", "value": { "id": "v", "type": "video" } },
            { "op": "replace", "path": "/version", "value": 9 },
            7
        ]);
        let kinds: Vec<PatchIssueKind> = validate_patch_value(&raw).iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PatchIssueKind::UnknownOp,
                PatchIssueKind::MissingValue,
                PatchIssueKind::MissingFrom,
                PatchIssueKind::DisallowedType,
                PatchIssueKind::ProtectedPath,
                PatchIssueKind::NotAnObject,
            ]
        );
        assert_eq!(
            validate_patch_value(&json!({})).first().map(|i| i.kind),
            Some(PatchIssueKind::NotAnArray)
        );
    }

    #[test]
    fn type_check_only_applies_to_component_slots() {
        let raw = json!([
            { "op": "add", "path": "/components/0/props/series", "value": { "type": "line" } },
            { "op": "replace", "path": "/components/0/type", "value": "marquee" }
        ]);
        let issues = validate_patch_value(&raw);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].index, 1);
    }

    #[test]
    fn children_inside_replaced_props_are_type_checked() {
        let raw = json!([
            { "op": "replace", "path": "/components/1/props",
              "value": { "components": [
                  { "id": "ok", "type": "column", "props": { "components": [
                      { "id": "deep", "type": "marquee" }
                  ] } },
                  { "id": "vid", "type": "video" }
              ] } },
            { "op": "replace", "path": "/name" }
        ]);
        let issues = validate_patch_value(&raw);
        let kinds: Vec<(usize, PatchIssueKind)> = issues.iter().map(|i| (i.index, i.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (0, PatchIssueKind::DisallowedType),
                (0, PatchIssueKind::DisallowedType),
                (1, PatchIssueKind::MissingValue),
            ]
        );

        let ops = vec![PatchOperation::replace(
            "/components/1/props",
            json!({ "components": [{ "id": "vid", "type": "video" }] }),
        )];
        let Err(PatchError::Invalid(issues)) = apply_patch(&doc(), &ops) else {
            panic!("expected structural rejection");
        };
        assert_eq!(issues[0].kind, PatchIssueKind::DisallowedType);
        assert_eq!(issues[0].path, "/components/1/props");
    }

    #[test]
    fn test_op_may_read_protected_fields() {
        let ops = vec![
            PatchOperation::test("/status", json!("draft")),
            PatchOperation::replace("/title", json!("Checked")),
        ];
        assert!(validate_patch_array(&ops).is_empty());
        let out = apply_patch(&doc(), &ops).unwrap();
        assert_eq!(out.extra.get("title"), Some(&json!("Checked")));

        let writes = vec![
            PatchOperation::replace("/status", json!("published")),
            PatchOperation::remove("/version"),
        ];
        let kinds: Vec<PatchIssueKind> = validate_patch_array(&writes).iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![PatchIssueKind::ProtectedPath; 2]);
    }

    #[test]
    fn explicit_null_value_is_present() {
        let ops = parse_patch(&json!([{ "op": "replace", "path": "/title", "value": null }])).unwrap();
        assert_eq!(ops[0].value, Some(Value::Null));
    }

    #[test]
    fn move_copy_remove_and_test() {
        let ops = vec![
            PatchOperation::test("/components/0/id", json!("hdr")),
            PatchOperation::copy_from("/components/0/props/content", "/subtitle"),
            PatchOperation::move_from("/components/1/props/components/0", "/components/0"),
            PatchOperation::remove("/components/2"),
        ];
        let out = apply_patch(&doc(), &ops).unwrap();
        let ids: Vec<&str> = out.components.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["cell", "hdr"]);
        assert_eq!(out.extra.get("subtitle"), Some(&json!("Hi")));
    }

    #[test]
    fn failed_test_reports_index() {
        let ops = vec![PatchOperation::test("/name", json!("other"))];
        assert_eq!(
            apply_patch(&doc(), &ops),
            Err(PatchError::TestFailed {
                index: 0,
                path: "/name".into()
            })
        );
    }

    #[test]
    fn duplicate_id_after_patch_is_rejected() {
        let ops = vec![PatchOperation::add(
            "/components/-",
            json!({ "id": "cell", "type": "text" }),
        )];
        assert!(matches!(apply_patch(&doc(), &ops), Err(PatchError::Tree(_))));
    }

    #[test]
    fn children_on_leaf_fail_decode() {
        let ops = vec![PatchOperation::add(
            "/components/0/props/components",
            json!([{ "id": "z", "type": "text" }]),
        )];
        assert!(matches!(apply_patch(&doc(), &ops), Err(PatchError::Decode(_))));
    }

    #[test]
    fn out_of_bounds_remove() {
        let ops = vec![PatchOperation::remove("/components/9")];
        assert!(matches!(
            apply_patch(&doc(), &ops),
            Err(PatchError::Apply { index: 0, .. })
        ));
    }

    #[test]
    fn envelope_parse() {
        let env = PatchEnvelope::parse(
            r#"{ "type": "screen_patch", "notes": "rename",
                 "patch": [ { "op": "replace", "path": "/name", "value": "Sales" } ] }"#,
        )
        .unwrap();
        assert_eq!(env.notes.as_deref(), Some("rename"));
        assert_eq!(env.patch.len(), 1);
        assert_eq!(env.to_value()["type"], json!(ENVELOPE_TYPE));
        assert!(matches!(
            PatchEnvelope::parse(r#"{ "type": "chat", "patch": [] }"#),
            Err(PatchError::Envelope(_))
        ));
    }
}
