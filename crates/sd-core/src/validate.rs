//! Validation gate for screen documents.
//!
//! Runs schema, binding, and action checks and reports findings without
//! modifying the document. Error-severity findings block publishing;
//! warnings are advisory.

use crate::binding::{BindingError, BindingScope, PathTreeNode, is_partial_binding, validate_binding_path};
use crate::id::ComponentId;
use crate::model::{Component, GridRect, LAYOUT_PROP, LayoutKind, ScreenDocument};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Handlers available in the `builtin:` namespace.
pub const BUILTIN_HANDLERS: [&str; 9] = [
    "navigate",
    "refresh",
    "open_modal",
    "close_modal",
    "set_state",
    "submit_form",
    "copy_to_clipboard",
    "download",
    "toast",
];

// ─── Findings ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Blocks publishing.
    Error,
    Warning,
}

/// Which stage of the gate produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Schema,
    Binding,
    Action,
    DryRun,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Schema => "schema",
            Self::Binding => "binding",
            Self::Action => "action",
            Self::DryRun => "dry-run",
        })
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub check: CheckKind,
    /// The component the finding refers to; `None` for document-level.
    pub component_id: Option<ComponentId>,
    /// Dotted location inside the document or component (e.g. `props.title`).
    pub field: Option<String>,
    pub message: String,
    /// Short rule identifier (e.g. "duplicate-component-id").
    pub rule: &'static str,
}

impl ValidationIssue {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// A failed or rejected dry-run of an action. Always a warning.
    pub fn dry_run(action_id: &str, component_id: Option<ComponentId>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            check: CheckKind::DryRun,
            component_id,
            field: Some(format!("actions.{action_id}")),
            message: message.into(),
            rule: "dry-run-failed",
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level}[{}/{}]", self.check, self.rule)?;
        if let Some(id) = self.component_id {
            write!(f, " {id}")?;
        }
        if let Some(field) = &self.field {
            write!(f, " {field}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// All findings of one validation run, in check order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    /// No error-severity findings.
    pub fn is_publishable(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = ValidationIssue>) {
        self.issues.extend(issues);
    }

    fn push(
        &mut self,
        severity: Severity,
        check: CheckKind,
        component_id: Option<ComponentId>,
        field: Option<String>,
        rule: &'static str,
        message: String,
    ) {
        self.issues.push(ValidationIssue {
            severity,
            check,
            component_id,
            field,
            message,
            rule,
        });
    }
}

// ─── Host-supplied context ───────────────────────────────────────────────

/// Known `api:` and `workflow:` handlers. A namespace left as `None` is not
/// checked against a catalog.
#[derive(Debug, Clone, Default)]
pub struct HandlerCatalog {
    pub api: Option<HashSet<String>>,
    pub workflow: Option<HashSet<String>>,
}

impl HandlerCatalog {
    #[must_use]
    pub fn with_api<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.api = Some(names.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }

    #[must_use]
    pub fn with_workflow<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.workflow = Some(names.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }
}

/// Everything the gate needs besides the document itself.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Declared `context.*` paths, if the host knows them.
    pub context: Option<Vec<PathTreeNode>>,
    /// Declared `inputs.*` paths, if the host knows them.
    pub inputs: Option<Vec<PathTreeNode>>,
    pub catalog: HandlerCatalog,
}

impl ValidationContext {
    /// Binding scope for `doc`: state from its schema plus the host's trees.
    pub fn scope_for(&self, doc: &ScreenDocument) -> BindingScope {
        BindingScope {
            context: self.context.clone(),
            inputs: self.inputs.clone(),
            ..BindingScope::for_document(doc)
        }
    }
}

// ─── Public API ──────────────────────────────────────────────────────────

/// Run the schema, binding, and action checks.
#[must_use]
pub fn validate_document(doc: &ScreenDocument, ctx: &ValidationContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_schema(doc, &mut report);
    check_bindings(doc, &ctx.scope_for(doc), &mut report);
    check_actions(doc, &ctx.catalog, &mut report);
    log::debug!(
        "validated {}: {} error(s), {} warning(s)",
        doc.screen_id,
        report.error_count(),
        report.warnings().count()
    );
    report
}

/// An action the dry-run step should exercise.
#[derive(Debug, Clone, PartialEq)]
pub struct DryRunTarget {
    pub action_id: String,
    pub component_id: Option<ComponentId>,
    pub payload: Value,
}

/// Screen-level actions first, then component actions in document order.
pub fn dry_run_targets(doc: &ScreenDocument) -> Vec<DryRunTarget> {
    let mut targets: Vec<DryRunTarget> = doc
        .actions
        .iter()
        .map(|a| DryRunTarget {
            action_id: a.id.clone(),
            component_id: None,
            payload: a.payload_template.clone(),
        })
        .collect();
    doc.walk(&mut |c, _| {
        targets.extend(c.actions.iter().map(|a| DryRunTarget {
            action_id: a.id.clone(),
            component_id: Some(c.id),
            payload: a.payload_template.clone(),
        }));
    });
    targets
}

// ─── Schema ──────────────────────────────────────────────────────────────

fn check_schema(doc: &ScreenDocument, report: &mut ValidationReport) {
    use CheckKind::Schema;
    use Severity::Error;

    for (field, value, rule) in [
        ("id", &doc.id, "empty-id"),
        ("screenId", &doc.screen_id, "empty-screen-id"),
        ("name", &doc.name, "empty-name"),
    ] {
        if value.trim().is_empty() {
            report.push(Error, Schema, None, Some(field.into()), rule, format!("`{field}` must not be empty"));
        }
    }

    for dup in doc.duplicate_ids() {
        report.push(
            Error,
            Schema,
            Some(dup),
            None,
            "duplicate-component-id",
            format!("component id `{dup}` is used more than once"),
        );
    }

    let mut seen = HashSet::new();
    for action in &doc.actions {
        if action.id.trim().is_empty() {
            report.push(Error, Schema, None, Some("actions".into()), "empty-action-id", "screen action with an empty id".into());
        } else if !seen.insert(action.id.as_str()) {
            report.push(
                Error,
                Schema,
                None,
                Some(format!("actions.{}", action.id)),
                "duplicate-action-id",
                format!("screen action id `{}` is used more than once", action.id),
            );
        }
    }

    if doc.layout.kind != LayoutKind::Flex && doc.layout.direction.is_some() {
        report.push(
            Error,
            Schema,
            None,
            Some("layout.direction".into()),
            "direction-non-flex",
            "`direction` only applies to flex layouts".into(),
        );
    }

    let grid = doc.layout.kind.uses_grid();
    doc.walk(&mut |c, parent| check_component_schema(c, parent.is_none() && grid, grid, report));
}

fn check_component_schema(c: &Component, needs_rect: bool, grid: bool, report: &mut ValidationReport) {
    use CheckKind::Schema;
    use Severity::{Error, Warning};
    let id = Some(c.id);

    if c.id.as_str().trim().is_empty() {
        report.push(Error, Schema, id, Some("id".into()), "empty-component-id", "component with an empty id".into());
    }

    let mut seen = HashSet::new();
    for action in &c.actions {
        if action.id.trim().is_empty() {
            report.push(Error, Schema, id, Some("actions".into()), "empty-action-id", "component action with an empty id".into());
        } else if !seen.insert(action.id.as_str()) {
            report.push(
                Error,
                Schema,
                id,
                Some(format!("actions.{}", action.id)),
                "duplicate-action-id",
                format!("action id `{}` is used more than once on this component", action.id),
            );
        }
    }

    if let Some(rule) = c.visibility.as_ref().and_then(|v| v.active_rule())
        && !crate::binding::is_binding_expression(rule)
    {
        report.push(
            Error,
            Schema,
            id,
            Some("visibility.rule".into()),
            "visibility-not-binding",
            format!("visibility rule `{rule}` must be a binding expression"),
        );
    }

    if !grid {
        return;
    }
    match c.props.get(LAYOUT_PROP) {
        None if needs_rect => report.push(
            Warning,
            Schema,
            id,
            Some(format!("props.{LAYOUT_PROP}")),
            "grid-missing-rect",
            "component has no grid position".into(),
        ),
        None => {}
        Some(_) => match GridRect::from_props(&c.props) {
            None => report.push(
                Error,
                Schema,
                id,
                Some(format!("props.{LAYOUT_PROP}")),
                "grid-invalid-rect",
                "grid position must have integer x, y, w, h".into(),
            ),
            Some(rect) if rect.x < 0 || rect.y < 0 => report.push(
                Error,
                Schema,
                id,
                Some(format!("props.{LAYOUT_PROP}")),
                "grid-negative-position",
                format!("grid position ({}, {}) must not be negative", rect.x, rect.y),
            ),
            Some(rect) if rect.w <= 0 || rect.h <= 0 => report.push(
                Error,
                Schema,
                id,
                Some(format!("props.{LAYOUT_PROP}")),
                "grid-empty-size",
                format!("grid size {}x{} must be positive", rect.w, rect.h),
            ),
            Some(_) => {}
        },
    }
}

// ─── Bindings ────────────────────────────────────────────────────────────

/// Visit every string inside `value` with its dotted location.
fn walk_strings(value: &Value, field: &str, f: &mut dyn FnMut(&str, &str)) {
    match value {
        Value::String(s) => f(s, field),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk_strings(item, &format!("{field}[{i}]"), f);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                walk_strings(item, &format!("{field}.{key}"), f);
            }
        }
        _ => {}
    }
}

fn check_binding_string(
    text: &str,
    field: &str,
    component_id: Option<ComponentId>,
    scope: &BindingScope,
    report: &mut ValidationReport,
) {
    use CheckKind::Binding;
    let errors = validate_binding_path(text, scope);
    if errors.is_empty() {
        if is_partial_binding(text) {
            report.push(
                Severity::Warning,
                Binding,
                component_id,
                Some(field.to_string()),
                "partial-binding",
                format!("`{text}` mixes static text with `{{{{`; it will render literally"),
            );
        }
        return;
    }
    for err in errors {
        let (severity, rule) = match err {
            BindingError::UnknownSource(_) => (Severity::Error, "unknown-binding-source"),
            BindingError::UnresolvedPath(_) => (Severity::Error, "unresolved-binding"),
            BindingError::Malformed(_) => (Severity::Error, "malformed-binding"),
            BindingError::UndeclaredSource(..) => (Severity::Warning, "unverified-binding"),
        };
        report.push(severity, Binding, component_id, Some(field.to_string()), rule, err.to_string());
    }
}

fn check_bindings(doc: &ScreenDocument, scope: &BindingScope, report: &mut ValidationReport) {
    for action in &doc.actions {
        let field = format!("actions.{}.payload_template", action.id);
        walk_strings(&action.payload_template, &field, &mut |s, f| {
            check_binding_string(s, f, None, scope, report)
        });
    }
    doc.walk(&mut |c, _| {
        let id = Some(c.id);
        for (key, value) in &c.props {
            walk_strings(value, &format!("props.{key}"), &mut |s, f| {
                check_binding_string(s, f, id, scope, report)
            });
        }
        if let Some(rule) = c.visibility.as_ref().and_then(|v| v.active_rule()) {
            check_binding_string(rule, "visibility.rule", id, scope, report);
        }
        for action in &c.actions {
            let field = format!("actions.{}.payload_template", action.id);
            walk_strings(&action.payload_template, &field, &mut |s, f| {
                check_binding_string(s, f, id, scope, report)
            });
        }
    });
}

// ─── Actions ─────────────────────────────────────────────────────────────

/// Split `namespace:name`. Both halves must be non-empty.
pub fn parse_handler(handler: &str) -> Option<(&str, &str)> {
    let (namespace, name) = handler.split_once(':')?;
    (!namespace.is_empty() && !name.is_empty()).then_some((namespace, name))
}

fn handler_problem(
    handler: &str,
    doc: &ScreenDocument,
    catalog: &HandlerCatalog,
) -> Option<(&'static str, String)> {
    let Some((namespace, name)) = parse_handler(handler) else {
        return Some(("invalid-handler", format!("handler `{handler}` is not `namespace:name`")));
    };
    let known = |set: &Option<HashSet<String>>| set.as_ref().is_none_or(|s| s.contains(name));
    match namespace {
        "builtin" if BUILTIN_HANDLERS.contains(&name) => None,
        "builtin" => Some(("unknown-builtin", format!("`{name}` is not a builtin handler"))),
        "api" if known(&catalog.api) => None,
        "api" => Some(("unknown-api-handler", format!("no api handler named `{name}`"))),
        "workflow" if known(&catalog.workflow) => None,
        "workflow" => Some(("unknown-workflow", format!("no workflow named `{name}`"))),
        "screen" if doc.screen_action(name).is_some() => None,
        "screen" => Some(("unknown-screen-action", format!("no screen action with id `{name}`"))),
        other => Some(("unknown-handler-namespace", format!("unknown handler namespace `{other}`"))),
    }
}

fn check_actions(doc: &ScreenDocument, catalog: &HandlerCatalog, report: &mut ValidationReport) {
    for action in &doc.actions {
        if let Some((rule, message)) = handler_problem(&action.handler, doc, catalog) {
            report.push(
                Severity::Error,
                CheckKind::Action,
                None,
                Some(format!("actions.{}.handler", action.id)),
                rule,
                message,
            );
        }
    }
    doc.walk(&mut |c, _| {
        for action in &c.actions {
            if let Some((rule, message)) = handler_problem(&action.handler, doc, catalog) {
                report.push(
                    Severity::Error,
                    CheckKind::Action,
                    Some(c.id),
                    Some(format!("actions.{}.handler", action.id)),
                    rule,
                    message,
                );
            }
        }
    });
}
