//! Structured subtree snapshots
//!
//! A mask replaces the contents of several host containers. Before it does,
//! the original children are captured as a tree of [`SnapshotNode`]s so they
//! can be rebuilt exactly. Engine-owned nodes are not captured; an
//! [`SnapshotNode::Owned`] slot records where one stood so the live node can
//! be put back at the same position on restore.

use crate::dom::{self, Dom};
use crate::types::OwnedRole;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotNode {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        children: Vec<SnapshotNode>,
    },
    Text(String),
    Owned(OwnedRole),
}

impl SnapshotNode {
    pub fn element(tag: &str, attributes: &[(&str, &str)], children: Vec<SnapshotNode>) -> Self {
        Self::Element {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            children,
        }
    }

    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Capture one node and its subtree.
pub fn capture<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> SnapshotNode {
    if let Some(role) = dom.owned_role(node) {
        return SnapshotNode::Owned(role);
    }

    if let Some(text) = dom.text_data(node) {
        return SnapshotNode::Text(text);
    }

    SnapshotNode::Element {
        tag: dom.tag_name(node).unwrap_or_default(),
        attributes: dom.attributes(node),
        children: capture_children(dom, node),
    }
}

/// Capture the children of `container`.
pub fn capture_children<D: Dom + ?Sized>(dom: &D, container: &D::Node) -> Vec<SnapshotNode> {
    dom.children(container)
        .iter()
        .filter(|child| dom.is_element(child) || dom.text_data(child).is_some())
        .map(|child| capture(dom, child))
        .collect()
}

/// Build a detached node from a snapshot. `Owned` slots build an empty
/// placeholder `span`; use [`restore_children`] to put live controls back.
pub fn materialize<D: Dom + ?Sized>(dom: &mut D, node: &SnapshotNode) -> D::Node {
    let mut pool = Vec::new();
    match build(dom, node, &mut pool) {
        Some(built) => built,
        None => dom.create_element("span"),
    }
}

fn build<D: Dom + ?Sized>(
    dom: &mut D,
    node: &SnapshotNode,
    pool: &mut Vec<(D::Node, OwnedRole)>,
) -> Option<D::Node> {
    match node {
        SnapshotNode::Text(text) => Some(dom.create_text(text)),
        SnapshotNode::Element { tag, attributes, children } => {
            let element = dom.create_element(tag);
            for (name, value) in attributes {
                dom.set_attribute(&element, name, value);
            }
            for child in children {
                if let Some(built) = build(dom, child, pool) {
                    dom::append_child(dom, &element, &built);
                }
            }
            Some(element)
        }
        SnapshotNode::Owned(role) => {
            let pos = pool.iter().position(|(_, r)| r == role)?;
            Some(pool.remove(pos).0)
        }
    }
}

/// Replace the children of `container` with the snapshot contents.
///
/// Live engine-owned nodes inside the container for which `keep` returns
/// true are detached first and re-inserted at their recorded slots. Kept
/// nodes without a slot are appended at the end; the rest are dropped.
pub fn restore_children<D: Dom + ?Sized>(
    dom: &mut D,
    container: &D::Node,
    snapshot: &[SnapshotNode],
    keep: impl Fn(OwnedRole) -> bool,
) {
    let mut pool = take_owned(dom, container, keep);
    dom::remove_all_children(dom, container);

    for node in snapshot {
        if let Some(built) = build(dom, node, &mut pool) {
            dom::append_child(dom, container, &built);
        }
    }

    for (leftover, _) in pool {
        dom::append_child(dom, container, &leftover);
    }
}

/// Detach the outermost owned nodes under `container` whose role passes
/// `keep`, preserving their order.
pub fn take_owned<D: Dom + ?Sized>(
    dom: &mut D,
    container: &D::Node,
    keep: impl Fn(OwnedRole) -> bool,
) -> Vec<(D::Node, OwnedRole)> {
    let owned: Vec<_> = dom::owned_nodes(dom, container)
        .into_iter()
        .filter(|(_, role)| keep(*role))
        .collect();
    for (node, _) in &owned {
        dom::detach(dom, node);
    }
    owned
}

/// Build a detached element `<tag attrs>` holding the snapshot contents.
/// Used to inspect a masked post's original markup without touching the page.
pub fn detached_copy<D: Dom + ?Sized>(
    dom: &mut D,
    tag: &str,
    attributes: &[(&str, &str)],
    children: &[SnapshotNode],
) -> D::Node {
    let container = dom.create_element(tag);
    for (name, value) in attributes {
        dom.set_attribute(&container, name, value);
    }
    let mut pool = Vec::new();
    for node in children {
        if let Some(built) = build(dom, node, &mut pool) {
            dom::append_child(dom, &container, &built);
        }
    }
    container
}
