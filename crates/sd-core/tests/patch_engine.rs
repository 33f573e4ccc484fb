//! Integration tests: copilot envelope → structural checks → atomic apply.

use pretty_assertions::assert_eq;
use sd_core::error::{PatchError, PatchIssueKind};
use sd_core::id::ComponentId;
use sd_core::model::ScreenDocument;
use sd_core::patch::{PatchEnvelope, PatchOperation, apply_patch, apply_patch_value};
use serde_json::json;

fn dashboard() -> ScreenDocument {
    ScreenDocument::from_json(include_str!("fixtures/orders_dashboard.json")).unwrap()
}

#[test]
fn copilot_envelope_applies_cleanly() {
    let doc = dashboard();
    let envelope = PatchEnvelope::parse(include_str!("fixtures/copilot_patch.json")).unwrap();
    assert_eq!(envelope.patch.len(), 3);

    let patched = apply_patch(&doc, &envelope.patch).unwrap();
    assert_eq!(patched.name, "Orders Overview");
    let card = patched.find(ComponentId::intern("orders_card")).unwrap();
    let ids: Vec<&str> = card.children.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["status_filter", "orders_table", "toolbar"]);
    assert!(patched.find(ComponentId::intern("status_filter")).unwrap().bind);

    // The input document is untouched.
    assert_eq!(doc, dashboard());
}

#[test]
fn whole_array_rejected_on_one_bad_op() {
    let doc = dashboard();
    let raw = json!([
        { "op": "replace", "path": "/name", "value": "Renamed" },
        { "op": "add", "path": "/components/-", "value": { "id": "frame", "type": "iframe" } }
    ]);
    let err = apply_patch_value(&doc, &raw).unwrap_err();
    let PatchError::Invalid(issues) = err else {
        panic!("expected structural rejection, got {err:?}");
    };
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].index, 1);
    assert_eq!(issues[0].kind, PatchIssueKind::DisallowedType);
    assert_eq!(doc.name, "Orders Dashboard");
}

#[test]
fn apply_failure_midway_leaves_document_unchanged() {
    let doc = dashboard();
    let ops = vec![
        PatchOperation::replace("/name", json!("Renamed")),
        PatchOperation::remove("/components/2/props/components/7"),
    ];
    let err = apply_patch(&doc, &ops).unwrap_err();
    assert!(matches!(err, PatchError::Apply { index: 1, .. }), "{err:?}");
    assert_eq!(doc, dashboard());
}

#[test]
fn replace_title_twice_is_idempotent() {
    let ops = vec![PatchOperation::replace("/title", json!("Q3 orders"))];
    let once = apply_patch(&dashboard(), &ops).unwrap();
    let twice = apply_patch(&once, &ops).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn moving_component_into_leaf_is_rejected() {
    let ops = vec![PatchOperation::move_from(
        "/components/1",
        "/components/0/props/components",
    )];
    assert!(apply_patch(&dashboard(), &ops).is_err());
}

#[test]
fn version_and_status_are_protected() {
    let ops = vec![
        PatchOperation::replace("/version", json!(99)),
        PatchOperation::replace("/status", json!("published")),
    ];
    let Err(PatchError::Invalid(issues)) = apply_patch(&dashboard(), &ops) else {
        panic!("protected fields must be rejected");
    };
    assert!(issues.iter().all(|i| i.kind == PatchIssueKind::ProtectedPath));
    assert_eq!(issues.len(), 2);
}
