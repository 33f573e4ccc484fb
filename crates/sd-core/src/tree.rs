//! Component tree operations.
//!
//! Every operation validates its preconditions before touching the
//! document, so an `Err` always leaves the tree exactly as it was.

use crate::error::TreeError;
use crate::id::ComponentId;
use crate::model::*;
use serde_json::{Map, Value};

/// Default grid rectangle size for components added to grid-like layouts.
pub const DEFAULT_GRID_SIZE: (i64, i64) = (6, 4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

/// Resolve an allow-listed type name.
pub fn parse_type(type_name: &str) -> Result<ComponentType, TreeError> {
    ComponentType::parse(type_name).ok_or_else(|| TreeError::UnsupportedType(type_name.to_string()))
}

fn fresh_component(doc: &ScreenDocument, kind: ComponentType) -> Component {
    Component::new(ComponentId::fresh(kind.as_str(), &doc.component_ids()), kind)
}

/// Check the invariants the typed model cannot express on its own.
pub fn check_tree_invariants(doc: &ScreenDocument) -> Result<(), TreeError> {
    if let Some(dup) = doc.duplicate_ids().first() {
        return Err(TreeError::DuplicateId(*dup));
    }
    let mut leaf_with_children = None;
    doc.walk(&mut |c, _| {
        if leaf_with_children.is_none() && !c.kind.is_container() && !c.children.is_empty() {
            leaf_with_children = Some(c.id);
        }
    });
    match leaf_with_children {
        Some(id) => Err(TreeError::NotAContainer(id)),
        None => Ok(()),
    }
}

// ─── Insertion ───────────────────────────────────────────────────────────

/// Add a new component at the root, appended or inserted at `at_index`
/// (clamped to the root length).
pub fn add_component(
    doc: &mut ScreenDocument,
    type_name: &str,
    at_index: Option<usize>,
) -> Result<ComponentId, TreeError> {
    let kind = parse_type(type_name)?;
    let mut component = fresh_component(doc, kind);
    if doc.layout.kind.uses_grid() {
        let y = doc
            .components
            .iter()
            .filter_map(|c| GridRect::from_props(&c.props))
            .map(|r| r.bottom())
            .max()
            .unwrap_or(0);
        let (w, h) = DEFAULT_GRID_SIZE;
        component
            .props
            .insert(LAYOUT_PROP.to_string(), GridRect { x: 0, y, w, h }.to_value());
    }
    let id = component.id;
    let index = at_index.map_or(doc.components.len(), |i| i.min(doc.components.len()));
    doc.components.insert(index, component);
    log::debug!("added {kind} {id} at root index {index}");
    Ok(id)
}

/// Add a new component as the last child of `parent_id`.
pub fn add_component_to_parent(
    doc: &mut ScreenDocument,
    type_name: &str,
    parent_id: ComponentId,
) -> Result<ComponentId, TreeError> {
    let kind = parse_type(type_name)?;
    let parent = doc.find(parent_id).ok_or(TreeError::NotFound(parent_id))?;
    if !parent.kind.is_container() {
        return Err(TreeError::NotAContainer(parent_id));
    }
    let component = fresh_component(doc, kind);
    let id = component.id;
    if let Some(parent) = doc.find_mut(parent_id) {
        parent.children.push(component);
    }
    log::debug!("added {kind} {id} under {parent_id}");
    Ok(id)
}

/// Insert an already-built subtree. Its ids must not collide with the
/// document.
pub fn insert_component(
    doc: &mut ScreenDocument,
    component: Component,
    parent: Option<ComponentId>,
    index: usize,
) -> Result<(), TreeError> {
    let taken = doc.component_ids();
    if let Some(dup) = component.subtree_ids().into_iter().find(|id| taken.contains(id)) {
        return Err(TreeError::DuplicateId(dup));
    }
    if let Some(pid) = parent {
        let p = doc.find(pid).ok_or(TreeError::NotFound(pid))?;
        if !p.kind.is_container() {
            return Err(TreeError::NotAContainer(pid));
        }
    }
    let siblings = doc
        .children_of_mut(parent)
        .ok_or(TreeError::NotFound(parent.unwrap_or(component.id)))?;
    let index = index.min(siblings.len());
    siblings.insert(index, component);
    Ok(())
}

// ─── Moving ──────────────────────────────────────────────────────────────

/// Swap with the previous/next sibling. Returns `false` at a boundary.
pub fn move_component(
    doc: &mut ScreenDocument,
    id: ComponentId,
    direction: MoveDirection,
) -> Result<bool, TreeError> {
    let loc = doc.locate(id).ok_or(TreeError::NotFound(id))?;
    let Some(siblings) = doc.children_of_mut(loc.parent) else {
        return Err(TreeError::NotFound(id));
    };
    let target = match direction {
        MoveDirection::Up if loc.index > 0 => loc.index - 1,
        MoveDirection::Down if loc.index + 1 < siblings.len() => loc.index + 1,
        _ => return Ok(false),
    };
    siblings.swap(loc.index, target);
    Ok(true)
}

/// Validate that `id` may be placed under `parent` (or the root).
fn check_destination(
    doc: &ScreenDocument,
    id: ComponentId,
    parent: Option<ComponentId>,
) -> Result<(), TreeError> {
    if !doc.contains(id) {
        return Err(TreeError::NotFound(id));
    }
    let Some(pid) = parent else {
        return Ok(());
    };
    let target = doc.find(pid).ok_or(TreeError::NotFound(pid))?;
    if doc.is_self_or_descendant(id, pid) {
        return Err(TreeError::CyclicMove { id, target: pid });
    }
    if !target.kind.is_container() {
        return Err(TreeError::NotAContainer(pid));
    }
    Ok(())
}

/// Remove a subtree from wherever it is.
fn detach(doc: &mut ScreenDocument, id: ComponentId) -> Option<(Location, Component)> {
    let loc = doc.locate(id)?;
    let siblings = doc.children_of_mut(loc.parent)?;
    Some((loc, siblings.remove(loc.index)))
}

/// Put a detached subtree at `parent`/`index`, or back where it came from if
/// the destination vanished.
fn attach(
    doc: &mut ScreenDocument,
    component: Component,
    parent: Option<ComponentId>,
    index: Option<usize>,
    origin: Location,
) -> Result<(), TreeError> {
    let id = component.id;
    match doc.children_of_mut(parent) {
        Some(siblings) => {
            let at = index.map_or(siblings.len(), |i| i.min(siblings.len()));
            siblings.insert(at, component);
            Ok(())
        }
        None => {
            if let Some(siblings) = doc.children_of_mut(origin.parent) {
                siblings.insert(origin.index.min(siblings.len()), component);
            }
            Err(TreeError::NotFound(parent.unwrap_or(id)))
        }
    }
}

/// Detach `id` and append it as the last child of `new_parent`.
pub fn move_component_to_parent(
    doc: &mut ScreenDocument,
    id: ComponentId,
    new_parent: ComponentId,
) -> Result<(), TreeError> {
    check_destination(doc, id, Some(new_parent))?;
    let (origin, component) = detach(doc, id).ok_or(TreeError::NotFound(id))?;
    attach(doc, component, Some(new_parent), None, origin)?;
    log::debug!("moved {id} into {new_parent}");
    Ok(())
}

/// Remove `id` and reinsert it at `new_index` among the children of
/// `parent` (`None` = root). The index is clamped to the list length after
/// removal.
pub fn reorder_component_at_index(
    doc: &mut ScreenDocument,
    id: ComponentId,
    new_index: usize,
    parent: Option<ComponentId>,
) -> Result<(), TreeError> {
    check_destination(doc, id, parent)?;
    let (origin, component) = detach(doc, id).ok_or(TreeError::NotFound(id))?;
    attach(doc, component, parent, Some(new_index), origin)?;
    log::debug!("reordered {id} to index {new_index}");
    Ok(())
}

// ─── Updates ─────────────────────────────────────────────────────────────

fn component_mut(doc: &mut ScreenDocument, id: ComponentId) -> Result<&mut Component, TreeError> {
    doc.find_mut(id).ok_or(TreeError::NotFound(id))
}

/// Shallow-merge `partial` into the component's props.
pub fn update_component_props(
    doc: &mut ScreenDocument,
    id: ComponentId,
    partial: Map<String, Value>,
) -> Result<(), TreeError> {
    if partial.contains_key(CHILDREN_PROP) {
        return Err(TreeError::ReservedProp(CHILDREN_PROP.to_string()));
    }
    let component = component_mut(doc, id)?;
    component.props.extend(partial);
    component.refresh_bind();
    Ok(())
}

/// Set the label; an empty label clears it.
pub fn update_component_label(
    doc: &mut ScreenDocument,
    id: ComponentId,
    label: &str,
) -> Result<(), TreeError> {
    let component = component_mut(doc, id)?;
    component.label = (!label.is_empty()).then(|| label.to_string());
    Ok(())
}

/// Set or clear (`None`) the visibility rule.
pub fn update_component_visibility(
    doc: &mut ScreenDocument,
    id: ComponentId,
    rule: Option<&str>,
) -> Result<(), TreeError> {
    let component = component_mut(doc, id)?;
    component.visibility = rule.map(|r| Visibility {
        rule: Some(r.to_string()),
    });
    Ok(())
}

/// Set the grid rectangle used by dashboard/grid layouts.
pub fn update_component_layout(
    doc: &mut ScreenDocument,
    id: ComponentId,
    rect: GridRect,
) -> Result<(), TreeError> {
    let component = component_mut(doc, id)?;
    component.props.insert(LAYOUT_PROP.to_string(), rect.to_value());
    Ok(())
}

// ─── Component actions ───────────────────────────────────────────────────

pub fn add_component_action(
    doc: &mut ScreenDocument,
    id: ComponentId,
    action: ComponentActionRef,
) -> Result<(), TreeError> {
    let component = component_mut(doc, id)?;
    if component.action(&action.id).is_some() {
        return Err(TreeError::DuplicateActionId {
            component: id,
            action: action.id,
        });
    }
    component.actions.push(action);
    Ok(())
}

pub fn update_component_action(
    doc: &mut ScreenDocument,
    id: ComponentId,
    action_id: &str,
    patch: ActionPatch,
) -> Result<(), TreeError> {
    let component = component_mut(doc, id)?;
    let action = component
        .actions
        .iter_mut()
        .find(|a| a.id == action_id)
        .ok_or_else(|| TreeError::ActionNotFound {
            component: id,
            action: action_id.to_string(),
        })?;
    if let Some(label) = patch.label {
        action.label = label;
    }
    if let Some(handler) = patch.handler {
        action.handler = handler;
    }
    if let Some(payload) = patch.payload_template {
        action.payload_template = payload;
    }
    Ok(())
}

pub fn delete_component_action(
    doc: &mut ScreenDocument,
    id: ComponentId,
    action_id: &str,
) -> Result<ComponentActionRef, TreeError> {
    let component = component_mut(doc, id)?;
    let pos = component
        .actions
        .iter()
        .position(|a| a.id == action_id)
        .ok_or_else(|| TreeError::ActionNotFound {
            component: id,
            action: action_id.to_string(),
        })?;
    Ok(component.actions.remove(pos))
}

// ─── Deletion ────────────────────────────────────────────────────────────

/// Remove the subtree rooted at `id`.
pub fn delete_component(doc: &mut ScreenDocument, id: ComponentId) -> Result<Component, TreeError> {
    let (_, removed) = detach(doc, id).ok_or(TreeError::NotFound(id))?;
    log::debug!("deleted {id} ({} component(s))", removed.subtree_len());
    Ok(removed)
}

/// Remove several subtrees. Ids already gone (e.g. nested inside an earlier
/// removal) are skipped.
pub fn delete_components(doc: &mut ScreenDocument, ids: &[ComponentId]) -> Vec<Component> {
    ids.iter()
        .filter_map(|id| detach(doc, *id).map(|(_, c)| c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc() -> ScreenDocument {
        ScreenDocument::from_json(
            r#"{ "id": "d", "screenId": "s", "name": "n", "components": [
                { "id": "a", "type": "text" },
                { "id": "box", "type": "container", "props": { "components": [
                    { "id": "inner", "type": "row", "props": { "components": [
                        { "id": "leaf", "type": "button" }
                    ] } }
                ] } },
                { "id": "z", "type": "divider" }
            ] }"#,
        )
        .unwrap()
    }

    fn id(s: &str) -> ComponentId {
        ComponentId::intern(s)
    }

    fn root_ids(doc: &ScreenDocument) -> Vec<&str> {
        doc.components.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn add_rejects_unknown_type() {
        let mut d = doc();
        let before = d.clone();
        assert_eq!(
            add_component(&mut d, "hologram", None),
            Err(TreeError::UnsupportedType("hologram".into()))
        );
        assert_eq!(d, before);
    }

    #[test]
    fn add_at_index_clamps() {
        let mut d = doc();
        let first = add_component(&mut d, "badge", Some(0)).unwrap();
        let last = add_component(&mut d, "badge", Some(99)).unwrap();
        assert_eq!(d.components[0].id, first);
        assert_eq!(d.components.last().unwrap().id, last);
        assert_eq!(d.components[0].props.get("text"), Some(&json!("Badge")));
    }

    #[test]
    fn add_to_leaf_parent_fails() {
        let mut d = doc();
        assert_eq!(
            add_component_to_parent(&mut d, "text", id("a")),
            Err(TreeError::NotAContainer(id("a")))
        );
        assert_eq!(
            add_component_to_parent(&mut d, "text", id("ghost")),
            Err(TreeError::NotFound(id("ghost")))
        );
    }

    #[test]
    fn grid_layout_stacks_new_components() {
        let mut d = ScreenDocument::new("d", "s", "n");
        d.layout.kind = LayoutKind::Dashboard;
        let first = add_component(&mut d, "stat", None).unwrap();
        let second = add_component(&mut d, "chart", None).unwrap();
        let r1 = GridRect::from_props(&d.find(first).unwrap().props).unwrap();
        let r2 = GridRect::from_props(&d.find(second).unwrap().props).unwrap();
        assert_eq!(r1.y, 0);
        assert_eq!(r2.y, r1.bottom());
    }

    #[test]
    fn move_up_down_and_boundaries() {
        let mut d = doc();
        assert_eq!(move_component(&mut d, id("a"), MoveDirection::Up), Ok(false));
        assert_eq!(move_component(&mut d, id("a"), MoveDirection::Down), Ok(true));
        assert_eq!(root_ids(&d), vec!["box", "a", "z"]);
        assert_eq!(move_component(&mut d, id("z"), MoveDirection::Down), Ok(false));
    }

    #[test]
    fn move_into_descendant_is_cyclic() {
        let mut d = doc();
        let before = d.clone();
        assert_eq!(
            move_component_to_parent(&mut d, id("box"), id("inner")),
            Err(TreeError::CyclicMove {
                id: id("box"),
                target: id("inner")
            })
        );
        assert_eq!(
            move_component_to_parent(&mut d, id("box"), id("box")),
            Err(TreeError::CyclicMove {
                id: id("box"),
                target: id("box")
            })
        );
        assert_eq!(d, before);
    }

    #[test]
    fn move_to_parent_appends_last() {
        let mut d = doc();
        move_component_to_parent(&mut d, id("a"), id("inner")).unwrap();
        let inner = d.find(id("inner")).unwrap();
        let ids: Vec<&str> = inner.children.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["leaf", "a"]);
        assert_eq!(root_ids(&d), vec!["box", "z"]);
    }

    #[test]
    fn reorder_clamps_and_moves_to_root() {
        let mut d = doc();
        reorder_component_at_index(&mut d, id("leaf"), 50, None).unwrap();
        assert_eq!(root_ids(&d), vec!["a", "box", "z", "leaf"]);
        reorder_component_at_index(&mut d, id("leaf"), 0, None).unwrap();
        assert_eq!(root_ids(&d), vec!["leaf", "a", "box", "z"]);
        reorder_component_at_index(&mut d, id("leaf"), 0, Some(id("inner"))).unwrap();
        assert_eq!(d.locate(id("leaf")).unwrap().parent, Some(id("inner")));
    }

    #[test]
    fn props_merge_and_bind_flag() {
        let mut d = doc();
        let mut partial = Map::new();
        partial.insert("content".into(), json!("{{state.greeting}}"));
        update_component_props(&mut d, id("a"), partial).unwrap();
        let a = d.find(id("a")).unwrap();
        assert!(a.bind);
        assert_eq!(a.props.get("content"), Some(&json!("{{state.greeting}}")));

        let mut reserved = Map::new();
        reserved.insert(CHILDREN_PROP.into(), json!([]));
        assert_eq!(
            update_component_props(&mut d, id("box"), reserved),
            Err(TreeError::ReservedProp(CHILDREN_PROP.into()))
        );
    }

    #[test]
    fn action_ids_unique_per_component() {
        let mut d = doc();
        let action = ComponentActionRef {
            id: "click".into(),
            label: "Click".into(),
            handler: "builtin:refresh".into(),
            payload_template: Value::Null,
        };
        add_component_action(&mut d, id("leaf"), action.clone()).unwrap();
        assert_eq!(
            add_component_action(&mut d, id("leaf"), action),
            Err(TreeError::DuplicateActionId {
                component: id("leaf"),
                action: "click".into()
            })
        );
        update_component_action(
            &mut d,
            id("leaf"),
            "click",
            ActionPatch {
                label: Some("Go".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(d.find(id("leaf")).unwrap().actions[0].label, "Go");
        delete_component_action(&mut d, id("leaf"), "click").unwrap();
        assert!(d.find(id("leaf")).unwrap().actions.is_empty());
    }

    #[test]
    fn delete_removes_subtree() {
        let mut d = doc();
        let removed = delete_component(&mut d, id("box")).unwrap();
        assert_eq!(removed.subtree_len(), 3);
        assert!(!d.contains(id("leaf")));
        let removed = delete_components(&mut d, &[id("a"), id("a"), id("z")]);
        assert_eq!(removed.len(), 2);
        assert!(d.components.is_empty());
    }

    #[test]
    fn invariants_catch_duplicates() {
        let mut d = doc();
        d.components.push(Component::new(id("leaf"), ComponentType::Text));
        assert_eq!(check_tree_invariants(&d), Err(TreeError::DuplicateId(id("leaf"))));
    }
}
