//! In-memory arena DOM
//!
//! A small document model with observer semantics close to the browser's:
//! child-list and character-data changes under the body are queued as
//! [`MutationRecord`]s and handed out by [`Document::take_records`]. Attribute
//! and style changes are not recorded. Nodes are never freed; detached nodes
//! simply stop being reachable from the body.

use crate::dom::{Dom, MutationRecord};
use crate::snapshot::{self, SnapshotNode};
use crate::types::OwnedRole;

/// Index of a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        display: Option<String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    owned: Option<OwnedRole>,
}

/// Arena-backed document rooted at a `<body>` element.
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    body: NodeId,
    pending: Vec<MutationRecord<NodeId>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let body = Slot {
            data: NodeData::Element {
                tag: "body".to_string(),
                attrs: Vec::new(),
                display: None,
            },
            parent: None,
            children: Vec::new(),
            owned: None,
        };
        Self {
            slots: vec![body],
            body: NodeId(0),
            pending: Vec::new(),
        }
    }

    #[inline]
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Drain queued mutation records, oldest first.
    pub fn take_records(&mut self) -> Vec<MutationRecord<NodeId>> {
        std::mem::take(&mut self.pending)
    }

    /// Number of queued mutation records.
    pub fn pending_records(&self) -> usize {
        self.pending.len()
    }

    /// Build `markup` and append it to `parent`, as the host page would.
    pub fn append_markup(&mut self, parent: &NodeId, markup: &SnapshotNode) -> NodeId {
        let node = snapshot::materialize(self, markup);
        self.insert_before(parent, &node, None);
        node
    }

    /// Replace a text node's data (a host-side in-place edit).
    pub fn set_text_data(&mut self, node: &NodeId, data: &str) {
        if let NodeData::Text(text) = &mut self.slots[node.0].data {
            text.clear();
            text.push_str(data);
            if self.is_connected(node) {
                self.pending.push(MutationRecord::character_data(*node));
            }
        }
    }

    /// Debug serialization, used by tests to compare subtrees.
    pub fn outer_html(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.write_html(*node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let slot = &self.slots[node.0];
        match &slot.data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Element { tag, attrs, display } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push_str(&format!(" {}=\"{}\"", name, value));
                }
                if let Some(display) = display {
                    out.push_str(&format!(" style=\"display: {}\"", display));
                }
                if let Some(role) = slot.owned {
                    out.push_str(&format!(" owned=\"{}\"", role.as_str()));
                }
                out.push('>');
                for child in &slot.children {
                    self.write_html(*child, out);
                }
                out.push_str(&format!("</{}>", tag));
            }
        }
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) -> bool {
        let children = &mut self.slots[parent.0].children;
        let Some(pos) = children.iter().position(|c| *c == child) else {
            return false;
        };
        children.remove(pos);
        self.slots[child.0].parent = None;
        true
    }
}

impl Dom for Document {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        self.body
    }

    fn is_element(&self, node: &NodeId) -> bool {
        matches!(self.slots[node.0].data, NodeData::Element { .. })
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        let mut current = Some(*node);
        while let Some(id) = current {
            if id == self.body {
                return true;
            }
            current = self.slots[id.0].parent;
        }
        false
    }

    fn tag_name(&self, node: &NodeId) -> Option<String> {
        match &self.slots[node.0].data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn text_data(&self, node: &NodeId) -> Option<String> {
        match &self.slots[node.0].data {
            NodeData::Text(text) => Some(text.clone()),
            NodeData::Element { .. } => None,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.slots[node.0].data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn attributes(&self, node: &NodeId) -> Vec<(String, String)> {
        match &self.slots[node.0].data {
            NodeData::Element { attrs, .. } => attrs.clone(),
            NodeData::Text(_) => Vec::new(),
        }
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.slots[node.0].data {
            match attrs.iter_mut().find(|(n, _)| n == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn remove_attribute(&mut self, node: &NodeId, name: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.slots[node.0].data {
            attrs.retain(|(n, _)| n != name);
        }
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.slots[node.0].parent
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.slots[node.0].children.clone()
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.slots.push(Slot {
            data: NodeData::Element {
                tag: tag.to_ascii_lowercase(),
                attrs: Vec::new(),
                display: None,
            },
            parent: None,
            children: Vec::new(),
            owned: None,
        });
        NodeId(self.slots.len() - 1)
    }

    fn create_text(&mut self, data: &str) -> NodeId {
        self.slots.push(Slot {
            data: NodeData::Text(data.to_string()),
            parent: None,
            children: Vec::new(),
            owned: None,
        });
        NodeId(self.slots.len() - 1)
    }

    fn insert_before(&mut self, parent: &NodeId, child: &NodeId, reference: Option<&NodeId>) {
        if parent == child || !self.is_element(parent) {
            return;
        }

        if let Some(old_parent) = self.slots[child.0].parent {
            self.remove_child(&old_parent, child);
        }

        let children = &mut self.slots[parent.0].children;
        let index = reference
            .and_then(|r| children.iter().position(|c| c == r))
            .unwrap_or(children.len());
        children.insert(index, *child);
        self.slots[child.0].parent = Some(*parent);

        if self.is_connected(parent) {
            self.pending
                .push(MutationRecord::child_list(*parent, vec![*child], Vec::new()));
        }
    }

    fn remove_child(&mut self, parent: &NodeId, child: &NodeId) {
        if self.unlink(*parent, *child) && self.is_connected(parent) {
            self.pending
                .push(MutationRecord::child_list(*parent, Vec::new(), vec![*child]));
        }
    }

    fn display(&self, node: &NodeId) -> Option<String> {
        match &self.slots[node.0].data {
            NodeData::Element { display, .. } => display.clone(),
            NodeData::Text(_) => None,
        }
    }

    fn set_display(&mut self, node: &NodeId, value: Option<&str>) {
        if let NodeData::Element { display, .. } = &mut self.slots[node.0].data {
            *display = value.map(str::to_string);
        }
    }

    fn owned_role(&self, node: &NodeId) -> Option<OwnedRole> {
        self.slots[node.0].owned
    }

    fn mark_owned(&mut self, node: &NodeId, role: OwnedRole) {
        self.slots[node.0].owned = Some(role);
    }
}
