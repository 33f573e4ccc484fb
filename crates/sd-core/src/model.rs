//! Core data model for screen documents.
//!
//! A screen document is an ordered tree of UI components plus screen-level
//! actions and a declaration of available state. Container components hold
//! their children in a typed `children` list; on the wire the children live
//! under `props.components`, which is the shape patches address.

use crate::binding::contains_binding;
use crate::id::ComponentId;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::fmt;

/// Prop key that holds the nested children of a container component.
pub const CHILDREN_PROP: &str = "components";

/// Prop key that holds the grid rectangle in dashboard/grid layouts.
pub const LAYOUT_PROP: &str = "layout";

// ─── Component types ─────────────────────────────────────────────────────

/// The allow-listed component types. Anything else is rejected on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    Text,
    Markdown,
    Table,
    Chart,
    Form,
    Input,
    Select,
    Checkbox,
    Button,
    Image,
    Card,
    Stat,
    Badge,
    Alert,
    Divider,
    Spacer,
    Progress,
    List,
    Container,
    Row,
    Column,
    Tabs,
    Modal,
    Accordion,
}

impl ComponentType {
    pub const ALL: [ComponentType; 24] = [
        Self::Text,
        Self::Markdown,
        Self::Table,
        Self::Chart,
        Self::Form,
        Self::Input,
        Self::Select,
        Self::Checkbox,
        Self::Button,
        Self::Image,
        Self::Card,
        Self::Stat,
        Self::Badge,
        Self::Alert,
        Self::Divider,
        Self::Spacer,
        Self::Progress,
        Self::List,
        Self::Container,
        Self::Row,
        Self::Column,
        Self::Tabs,
        Self::Modal,
        Self::Accordion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Table => "table",
            Self::Chart => "chart",
            Self::Form => "form",
            Self::Input => "input",
            Self::Select => "select",
            Self::Checkbox => "checkbox",
            Self::Button => "button",
            Self::Image => "image",
            Self::Card => "card",
            Self::Stat => "stat",
            Self::Badge => "badge",
            Self::Alert => "alert",
            Self::Divider => "divider",
            Self::Spacer => "spacer",
            Self::Progress => "progress",
            Self::List => "list",
            Self::Container => "container",
            Self::Row => "row",
            Self::Column => "column",
            Self::Tabs => "tabs",
            Self::Modal => "modal",
            Self::Accordion => "accordion",
        }
    }

    /// Look up an allow-listed type by its wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }

    /// Whether components of this type may hold nested children.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Container
                | Self::Card
                | Self::Row
                | Self::Column
                | Self::Tabs
                | Self::Modal
                | Self::Accordion
                | Self::Form
                | Self::List
        )
    }

    /// Props a freshly added component of this type starts with.
    pub fn default_props(&self) -> Map<String, Value> {
        let value = match self {
            Self::Text => json!({ "content": "Text" }),
            Self::Markdown => json!({ "content": "" }),
            Self::Table => json!({ "columns": [], "data": [] }),
            Self::Chart => json!({ "chartType": "bar", "data": [] }),
            Self::Form => json!({ "submitLabel": "Submit" }),
            Self::Input => json!({ "name": "", "placeholder": "" }),
            Self::Select => json!({ "name": "", "options": [] }),
            Self::Checkbox => json!({ "name": "", "checked": false }),
            Self::Button => json!({ "label": "Button", "variant": "primary" }),
            Self::Image => json!({ "src": "", "alt": "" }),
            Self::Card => json!({ "title": "" }),
            Self::Stat => json!({ "label": "Metric", "value": 0 }),
            Self::Badge => json!({ "text": "Badge" }),
            Self::Alert => json!({ "title": "", "message": "", "variant": "info" }),
            Self::Divider => json!({}),
            Self::Spacer => json!({ "height": 16 }),
            Self::Progress => json!({ "value": 0, "max": 100 }),
            Self::List => json!({ "items": [] }),
            Self::Container | Self::Row | Self::Column => json!({ "gap": 8 }),
            Self::Tabs => json!({ "activeTab": 0 }),
            Self::Modal => json!({ "title": "", "open": false }),
            Self::Accordion => json!({ "expanded": false }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Document-level enums ────────────────────────────────────────────────

/// Lifecycle state of a screen document. Only drafts are editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    #[default]
    Flex,
    Grid,
    Tabs,
    Dashboard,
}

impl LayoutKind {
    /// Grid-like layouts position components with `props.layout` rects.
    pub fn uses_grid(&self) -> bool {
        matches!(self, Self::Grid | Self::Dashboard)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlexDirection {
    Row,
    Column,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenLayout {
    #[serde(rename = "type", default)]
    pub kind: LayoutKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<FlexDirection>,
}

/// Structural description of the state fields a screen exposes to bindings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateDeclaration {
    #[serde(default)]
    pub schema: Value,
}

// ─── Actions ─────────────────────────────────────────────────────────────

/// A screen-level action definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub handler: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload_template: Value,
}

/// An action attached to a single component (e.g. a button click).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentActionRef {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub handler: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload_template: Value,
}

/// Partial update for a component action. `None` fields are left as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionPatch {
    pub label: Option<String>,
    pub handler: Option<String>,
    pub payload_template: Option<Value>,
}

/// Visibility rule: a binding expression expected to resolve to a boolean.
/// `None` or an empty rule means always visible.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Visibility {
    pub rule: Option<String>,
}

impl Visibility {
    pub fn active_rule(&self) -> Option<&str> {
        self.rule.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

// ─── Grid placement ──────────────────────────────────────────────────────

/// Placement of a component in grid-cell units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridRect {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl GridRect {
    /// Read `props.layout`, if present and well-formed.
    pub fn from_props(props: &Map<String, Value>) -> Option<Self> {
        props
            .get(LAYOUT_PROP)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn to_value(self) -> Value {
        json!({ "x": self.x, "y": self.y, "w": self.w, "h": self.h })
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.h
    }
}

// ─── Components ──────────────────────────────────────────────────────────

/// A node in the UI tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawComponent")]
pub struct Component {
    pub id: ComponentId,
    pub kind: ComponentType,
    pub label: Option<String>,
    /// Free-form props, never containing the children key.
    pub props: Map<String, Value>,
    /// Nested children. Always empty for non-container types.
    pub children: Vec<Component>,
    /// Whether any prop carries a binding expression.
    pub bind: bool,
    pub visibility: Option<Visibility>,
    pub actions: SmallVec<[ComponentActionRef; 2]>,
}

impl Component {
    pub fn new(id: ComponentId, kind: ComponentType) -> Self {
        Self {
            id,
            kind,
            label: None,
            props: kind.default_props(),
            children: Vec::new(),
            bind: false,
            visibility: None,
            actions: SmallVec::new(),
        }
    }

    /// Recompute the `bind` flag from the current props.
    pub fn refresh_bind(&mut self) {
        self.bind = self.props.values().any(contains_binding);
    }

    /// Number of components in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Component::subtree_len).sum::<usize>()
    }

    /// IDs of this component and all its descendants, in document order.
    pub fn subtree_ids(&self) -> Vec<ComponentId> {
        let mut ids = Vec::with_capacity(self.subtree_len());
        walk_components(std::slice::from_ref(self), None, &mut |c, _| ids.push(c.id));
        ids
    }

    pub fn action(&self, action_id: &str) -> Option<&ComponentActionRef> {
        self.actions.iter().find(|a| a.id == action_id)
    }
}

/// Wire shape of a component: children live inside `props`.
#[derive(Deserialize)]
struct RawComponent {
    id: ComponentId,
    #[serde(rename = "type")]
    kind: ComponentType,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    props: Map<String, Value>,
    #[serde(default)]
    bind: bool,
    #[serde(default)]
    visibility: Option<Visibility>,
    #[serde(default)]
    actions: SmallVec<[ComponentActionRef; 2]>,
}

impl TryFrom<RawComponent> for Component {
    type Error = String;

    fn try_from(mut raw: RawComponent) -> Result<Self, Self::Error> {
        let children: Vec<Component> = match raw.props.remove(CHILDREN_PROP) {
            None | Some(Value::Null) => Vec::new(),
            Some(value @ Value::Array(_)) => {
                serde_json::from_value(value).map_err(|e| e.to_string())?
            }
            Some(_) => {
                return Err(format!(
                    "`props.{CHILDREN_PROP}` of component `{}` must be an array",
                    raw.id
                ));
            }
        };
        if !children.is_empty() && !raw.kind.is_container() {
            return Err(format!(
                "component `{}` of type `{}` cannot hold children",
                raw.id, raw.kind
            ));
        }
        Ok(Component {
            id: raw.id,
            kind: raw.kind,
            label: raw.label,
            props: raw.props,
            children,
            bind: raw.bind,
            visibility: raw.visibility,
            actions: raw.actions,
        })
    }
}

impl Serialize for Component {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = 3
            + usize::from(self.label.is_some())
            + usize::from(self.bind)
            + usize::from(self.visibility.is_some())
            + usize::from(!self.actions.is_empty());
        let mut st = serializer.serialize_struct("Component", fields)?;
        st.serialize_field("id", &self.id)?;
        st.serialize_field("type", &self.kind)?;
        if let Some(label) = &self.label {
            st.serialize_field("label", label)?;
        }
        st.serialize_field("props", &WireProps(self))?;
        if self.bind {
            st.serialize_field("bind", &true)?;
        }
        if let Some(visibility) = &self.visibility {
            st.serialize_field("visibility", visibility)?;
        }
        if !self.actions.is_empty() {
            st.serialize_field("actions", &self.actions)?;
        }
        st.end()
    }
}

/// `props` as written on the wire, with container children appended.
struct WireProps<'a>(&'a Component);

impl Serialize for WireProps<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let c = self.0;
        let container = c.kind.is_container();
        let mut map = serializer.serialize_map(Some(c.props.len() + usize::from(container)))?;
        for (key, value) in &c.props {
            map.serialize_entry(key, value)?;
        }
        if container {
            map.serialize_entry(CHILDREN_PROP, &c.children)?;
        }
        map.end()
    }
}

/// Depth-first, pre-order traversal. The callback receives each component
/// and the id of its parent (`None` at the root level).
pub fn walk_components<'a>(
    list: &'a [Component],
    parent: Option<ComponentId>,
    f: &mut dyn FnMut(&'a Component, Option<ComponentId>),
) {
    for c in list {
        f(c, parent);
        walk_components(&c.children, Some(c.id), f);
    }
}

fn find_in(list: &[Component], id: ComponentId) -> Option<&Component> {
    for c in list {
        if c.id == id {
            return Some(c);
        }
        if let Some(found) = find_in(&c.children, id) {
            return Some(found);
        }
    }
    None
}

fn find_in_mut(list: &mut [Component], id: ComponentId) -> Option<&mut Component> {
    for c in list {
        if c.id == id {
            return Some(c);
        }
        if let Some(found) = find_in_mut(&mut c.children, id) {
            return Some(found);
        }
    }
    None
}

// ─── Screen document ─────────────────────────────────────────────────────

/// Where a component sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Parent component, or `None` for the root level.
    pub parent: Option<ComponentId>,
    pub index: usize,
}

/// The versioned UI schema edited by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenDocument {
    pub id: String,
    pub screen_id: String,
    pub name: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub status: ScreenStatus,
    #[serde(default)]
    pub layout: ScreenLayout,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
    #[serde(default)]
    pub state: StateDeclaration,
    /// Top-level fields the engine does not model, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScreenDocument {
    /// Create an empty draft.
    #[must_use]
    pub fn new(id: &str, screen_id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            screen_id: screen_id.to_string(),
            name: name.to_string(),
            version: 0,
            status: ScreenStatus::Draft,
            layout: ScreenLayout::default(),
            components: Vec::new(),
            actions: Vec::new(),
            state: StateDeclaration::default(),
            extra: Map::new(),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_draft(&self) -> bool {
        self.status == ScreenStatus::Draft
    }

    /// Look up a component anywhere in the tree.
    pub fn find(&self, id: ComponentId) -> Option<&Component> {
        find_in(&self.components, id)
    }

    pub fn find_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        find_in_mut(&mut self.components, id)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.find(id).is_some()
    }

    /// Parent and sibling index of a component.
    pub fn locate(&self, id: ComponentId) -> Option<Location> {
        let mut found = None;
        self.walk(&mut |c, parent| {
            if found.is_none() && c.id == id {
                found = Some(parent);
            }
        });
        let parent = found?;
        let index = self.children_of(parent)?.iter().position(|c| c.id == id)?;
        Some(Location { parent, index })
    }

    /// Children of `parent`, or the root list for `None`.
    pub fn children_of(&self, parent: Option<ComponentId>) -> Option<&[Component]> {
        match parent {
            None => Some(&self.components),
            Some(pid) => self.find(pid).map(|p| p.children.as_slice()),
        }
    }

    pub fn children_of_mut(&mut self, parent: Option<ComponentId>) -> Option<&mut Vec<Component>> {
        match parent {
            None => Some(&mut self.components),
            Some(pid) => self.find_mut(pid).map(|p| &mut p.children),
        }
    }

    /// True if `candidate` is `ancestor` itself or nested anywhere below it.
    pub fn is_self_or_descendant(&self, ancestor: ComponentId, candidate: ComponentId) -> bool {
        self.find(ancestor)
            .map(|a| a.id == candidate || find_in(&a.children, candidate).is_some())
            .unwrap_or(false)
    }

    /// Visit every component in document order.
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Component, Option<ComponentId>)) {
        walk_components(&self.components, None, f);
    }

    /// All component ids in document order (duplicates included).
    pub fn ids_in_order(&self) -> Vec<ComponentId> {
        let mut ids = Vec::new();
        self.walk(&mut |c, _| ids.push(c.id));
        ids
    }

    pub fn component_ids(&self) -> HashSet<ComponentId> {
        self.ids_in_order().into_iter().collect()
    }

    pub fn component_count(&self) -> usize {
        self.components.iter().map(Component::subtree_len).sum()
    }

    /// IDs appearing more than once anywhere in the tree.
    pub fn duplicate_ids(&self) -> Vec<ComponentId> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        for id in self.ids_in_order() {
            if !seen.insert(id) && !dups.contains(&id) {
                dups.push(id);
            }
        }
        dups
    }

    pub fn screen_action(&self, action_id: &str) -> Option<&ActionDefinition> {
        self.actions.iter().find(|a| a.id == action_id)
    }
}
