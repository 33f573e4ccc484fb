//! Selection state and clipboard operations on component subtrees.
//!
//! A selection is either a single component or an unordered set. Clipboard
//! contents are id-less templates, so every paste and duplicate mints fresh
//! ids at every level of the subtree.

use sd_core::error::TreeError;
use sd_core::id::ComponentId;
use sd_core::model::{Component, ComponentActionRef, ComponentType, ScreenDocument, Visibility};
use sd_core::tree;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::HashSet;

// ─── Selection ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Single selection. Mutually exclusive with `multi`.
    primary: Option<ComponentId>,
    /// Multi-selection, set semantics, insertion order kept for display.
    multi: Vec<ComponentId>,
    /// Last plain or toggle click; the fixed end of a range select.
    anchor: Option<ComponentId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary(&self) -> Option<ComponentId> {
        self.primary
    }

    pub fn multi(&self) -> &[ComponentId] {
        &self.multi
    }

    pub fn anchor(&self) -> Option<ComponentId> {
        self.anchor
    }

    /// Every selected id, whichever mode is active.
    pub fn ids(&self) -> Vec<ComponentId> {
        match self.primary {
            Some(id) => vec![id],
            None => self.multi.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.multi.is_empty()
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.primary == Some(id) || self.multi.contains(&id)
    }

    /// Plain click: single-select `id`, dropping any multi-selection.
    pub fn select(&mut self, id: ComponentId) {
        self.primary = Some(id);
        self.multi.clear();
        self.anchor = Some(id);
    }

    /// Ctrl/cmd click: add or remove `id` from the multi-selection. A prior
    /// single selection joins the set.
    pub fn toggle(&mut self, id: ComponentId) {
        if let Some(single) = self.primary.take() {
            if single == id {
                self.anchor = Some(id);
                return;
            }
            self.multi.push(single);
        }
        match self.multi.iter().position(|m| *m == id) {
            Some(pos) => {
                self.multi.remove(pos);
            }
            None => self.multi.push(id),
        }
        self.anchor = Some(id);
    }

    /// Shift click: select the contiguous sibling range between the anchor
    /// and `id`. Without an anchor, or across parents, only `id` is
    /// selected.
    pub fn range_select(&mut self, doc: &ScreenDocument, id: ComponentId) {
        let range = self.anchor.and_then(|anchor| sibling_range(doc, anchor, id));
        match range {
            Some(ids) if ids.len() > 1 => {
                self.primary = None;
                self.multi = ids;
            }
            _ => self.select(id),
        }
    }

    /// Multi-select every root component.
    pub fn select_all(&mut self, doc: &ScreenDocument) {
        self.primary = None;
        self.multi = doc.components.iter().map(|c| c.id).collect();
        self.anchor = self.multi.first().copied();
    }

    pub fn clear(&mut self) {
        self.primary = None;
        self.multi.clear();
        self.anchor = None;
    }

    /// Drop ids that no longer exist in `doc` (after delete, undo, redo).
    pub fn prune(&mut self, doc: &ScreenDocument) {
        if self.primary.is_some_and(|id| !doc.contains(id)) {
            self.primary = None;
        }
        self.multi.retain(|id| doc.contains(*id));
        if self.anchor.is_some_and(|id| !doc.contains(id)) {
            self.anchor = None;
        }
    }
}

/// Ids from `a` to `b` inclusive, in sibling order, if both share a parent.
fn sibling_range(doc: &ScreenDocument, a: ComponentId, b: ComponentId) -> Option<Vec<ComponentId>> {
    let la = doc.locate(a)?;
    let lb = doc.locate(b)?;
    if la.parent != lb.parent {
        return None;
    }
    let siblings = doc.children_of(la.parent)?;
    let (lo, hi) = if la.index <= lb.index {
        (la.index, lb.index)
    } else {
        (lb.index, la.index)
    };
    Some(siblings[lo..=hi].iter().map(|c| c.id).collect())
}

// ─── Clipboard templates ─────────────────────────────────────────────────

/// A component subtree with ids stripped. Serializable so hosts can put
/// the clipboard on the system pasteboard as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTemplate {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default)]
    pub bind: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "SmallVec::is_empty")]
    pub actions: SmallVec<[ComponentActionRef; 2]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComponentTemplate>,
}

impl ComponentTemplate {
    pub fn from_component(c: &Component) -> Self {
        Self {
            kind: c.kind,
            label: c.label.clone(),
            props: c.props.clone(),
            bind: c.bind,
            visibility: c.visibility.clone(),
            actions: c.actions.clone(),
            children: c.children.iter().map(Self::from_component).collect(),
        }
    }

    /// Build a component, minting ids not in `taken` and adding them to it.
    pub fn instantiate(&self, taken: &mut HashSet<ComponentId>) -> Component {
        let id = ComponentId::fresh(self.kind.as_str(), taken);
        taken.insert(id);
        Component {
            id,
            kind: self.kind,
            label: self.label.clone(),
            props: self.props.clone(),
            children: self.children.iter().map(|t| t.instantiate(taken)).collect(),
            bind: self.bind,
            visibility: self.visibility.clone(),
            actions: self.actions.clone(),
        }
    }

    /// Number of components this template expands to.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(ComponentTemplate::subtree_len).sum::<usize>()
    }
}

/// Existing ids, without descendants of other listed ids, in document order.
pub fn normalize_selection(doc: &ScreenDocument, ids: &[ComponentId]) -> Vec<ComponentId> {
    let wanted: HashSet<ComponentId> = ids.iter().copied().collect();
    let mut out = Vec::new();
    collect_topmost(&doc.components, &wanted, &mut out);
    out
}

fn collect_topmost(list: &[Component], wanted: &HashSet<ComponentId>, out: &mut Vec<ComponentId>) {
    for c in list {
        if wanted.contains(&c.id) {
            out.push(c.id);
        } else {
            collect_topmost(&c.children, wanted, out);
        }
    }
}

/// Templates for the selected subtrees.
pub fn copy_components(doc: &ScreenDocument, ids: &[ComponentId]) -> Vec<ComponentTemplate> {
    normalize_selection(doc, ids)
        .into_iter()
        .filter_map(|id| doc.find(id))
        .map(ComponentTemplate::from_component)
        .collect()
}

/// Insert `templates` as siblings after the last selected component (in
/// document order), or at the root end when nothing is selected. Returns
/// the ids of the inserted subtree roots.
pub fn paste_components(
    doc: &mut ScreenDocument,
    templates: &[ComponentTemplate],
    after: &[ComponentId],
) -> Result<Vec<ComponentId>, TreeError> {
    let (parent, mut index) = match normalize_selection(doc, after).last() {
        Some(last) => {
            let loc = doc.locate(*last).ok_or(TreeError::NotFound(*last))?;
            (loc.parent, loc.index + 1)
        }
        None => (None, doc.components.len()),
    };
    let mut taken = doc.component_ids();
    let mut pasted = Vec::with_capacity(templates.len());
    for template in templates {
        let component = template.instantiate(&mut taken);
        pasted.push(component.id);
        tree::insert_component(doc, component, parent, index)?;
        index += 1;
    }
    log::debug!("pasted {} component(s)", pasted.len());
    Ok(pasted)
}

/// Clone each selected subtree directly after its original. Returns the
/// ids of the new subtree roots in document order.
pub fn duplicate_components(
    doc: &mut ScreenDocument,
    ids: &[ComponentId],
) -> Result<Vec<ComponentId>, TreeError> {
    let originals = normalize_selection(doc, ids);
    let mut taken = doc.component_ids();
    let mut created = Vec::with_capacity(originals.len());
    for id in originals {
        let loc = doc.locate(id).ok_or(TreeError::NotFound(id))?;
        let template = doc
            .find(id)
            .map(ComponentTemplate::from_component)
            .ok_or(TreeError::NotFound(id))?;
        let copy = template.instantiate(&mut taken);
        created.push(copy.id);
        tree::insert_component(doc, copy, loc.parent, loc.index + 1)?;
    }
    log::debug!("duplicated {} component(s)", created.len());
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> ComponentId {
        ComponentId::intern(s)
    }

    fn doc() -> ScreenDocument {
        ScreenDocument::from_json(
            r#"{ "id": "d", "screenId": "s", "name": "n", "components": [
                { "id": "s1", "type": "text" },
                { "id": "s2", "type": "text" },
                { "id": "s3", "type": "text" },
                { "id": "panel", "type": "card", "props": { "components": [
                    { "id": "p1", "type": "badge" },
                    { "id": "p2", "type": "badge" }
                ] } }
            ] }"#,
        )
        .unwrap()
    }

    #[test]
    fn select_clears_multi_and_toggle_clears_single() {
        let mut sel = Selection::new();
        sel.toggle(id("s1"));
        sel.toggle(id("s2"));
        assert_eq!(sel.multi(), &[id("s1"), id("s2")]);
        sel.select(id("s3"));
        assert_eq!(sel.primary(), Some(id("s3")));
        assert!(sel.multi().is_empty());
        sel.toggle(id("s1"));
        assert_eq!(sel.primary(), None);
        assert_eq!(sel.ids(), vec![id("s3"), id("s1")]);
        sel.toggle(id("s3"));
        assert_eq!(sel.ids(), vec![id("s1")]);
    }

    #[test]
    fn range_select_among_siblings() {
        let d = doc();
        let mut sel = Selection::new();
        sel.select(id("s3"));
        sel.range_select(&d, id("s1"));
        assert_eq!(sel.multi(), &[id("s1"), id("s2"), id("s3")]);
        assert_eq!(sel.primary(), None);
    }

    #[test]
    fn range_select_across_parents_selects_clicked_only() {
        let d = doc();
        let mut sel = Selection::new();
        sel.select(id("s1"));
        sel.range_select(&d, id("p2"));
        assert_eq!(sel.ids(), vec![id("p2")]);
    }

    #[test]
    fn prune_drops_missing_ids() {
        let mut d = doc();
        let mut sel = Selection::new();
        sel.select_all(&d);
        tree::delete_component(&mut d, id("s2")).unwrap();
        sel.prune(&d);
        assert_eq!(sel.ids(), vec![id("s1"), id("s3"), id("panel")]);
    }

    #[test]
    fn ancestor_wins_over_descendant() {
        let d = doc();
        assert_eq!(
            normalize_selection(&d, &[id("p1"), id("panel"), id("s1"), id("ghost")]),
            vec![id("s1"), id("panel")]
        );
        let templates = copy_components(&d, &[id("p1"), id("panel")]);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].subtree_len(), 3);
    }

    #[test]
    fn paste_after_selection_with_fresh_ids() {
        let mut d = doc();
        let templates = copy_components(&d, &[id("panel")]);
        let pasted = paste_components(&mut d, &templates, &[id("s1")]).unwrap();
        assert_eq!(d.components[1].id, pasted[0]);
        assert_ne!(pasted[0], id("panel"));
        assert_eq!(d.duplicate_ids(), vec![]);
        assert_eq!(d.component_count(), 9);
    }

    #[test]
    fn paste_without_selection_goes_to_root_end() {
        let mut d = doc();
        let templates = copy_components(&d, &[id("p1")]);
        let pasted = paste_components(&mut d, &templates, &[]).unwrap();
        assert_eq!(d.components.last().map(|c| c.id), Some(pasted[0]));
    }

    #[test]
    fn duplicate_inserts_after_each_original() {
        let mut d = doc();
        let created = duplicate_components(&mut d, &[id("s1"), id("p1")]).unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(d.components[1].id, created[0]);
        let panel = d.find(id("panel")).unwrap();
        assert_eq!(panel.children[1].id, created[1]);
        assert_eq!(panel.children.len(), 3);
    }
}
