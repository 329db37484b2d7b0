//! Host DOM abstraction
//!
//! The engine never keeps host nodes between passes. Everything it needs from
//! the page goes through [`Dom`], implemented here over an in-memory arena
//! ([`Document`]) and over `web_sys` in the wasm crate.
//!
//! Query helpers are free functions generic over [`Dom`]. Descendant walks
//! never enter engine-owned subtrees, so host queries cannot pick up the
//! engine's own labels and panels.

mod arena;

pub use arena::{Document, NodeId};

use crate::types::OwnedRole;

/// Attribute carrying the [`OwnedRole`] of an injected node on backends
/// without native node flags.
pub const OWNED_ATTR: &str = "data-ff-owned";

// =============================================================================
// Dom trait
// =============================================================================

/// Minimal DOM surface the engine operates on.
pub trait Dom {
    type Node: Clone + PartialEq + std::fmt::Debug;

    /// The observed subtree (the document body).
    fn root(&self) -> Self::Node;

    fn is_element(&self, node: &Self::Node) -> bool;

    /// Whether the node is still attached under the root.
    fn is_connected(&self, node: &Self::Node) -> bool;

    /// Lowercase tag name for elements.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;

    /// Character data of a text node.
    fn text_data(&self, node: &Self::Node) -> Option<String>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// All attributes in document order.
    fn attributes(&self, node: &Self::Node) -> Vec<(String, String)>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    fn remove_attribute(&mut self, node: &Self::Node, name: &str);

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Create a detached element.
    fn create_element(&mut self, tag: &str) -> Self::Node;

    /// Create a detached text node.
    fn create_text(&mut self, data: &str) -> Self::Node;

    /// Insert `child` before `reference`, or append when `reference` is `None`.
    /// A child that already has a parent is moved.
    fn insert_before(&mut self, parent: &Self::Node, child: &Self::Node, reference: Option<&Self::Node>);

    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node);

    /// Inline `display` style, `None` when unset.
    fn display(&self, node: &Self::Node) -> Option<String>;

    fn set_display(&mut self, node: &Self::Node, value: Option<&str>);

    /// Role of an engine-injected node, `None` for host nodes.
    fn owned_role(&self, node: &Self::Node) -> Option<OwnedRole> {
        self.attribute(node, OWNED_ATTR)
            .and_then(|value| OwnedRole::parse(&value))
    }

    /// Tag a node as engine-owned.
    fn mark_owned(&mut self, node: &Self::Node, role: OwnedRole) {
        self.set_attribute(node, OWNED_ATTR, role.as_str());
    }
}

// =============================================================================
// Mutation Records
// =============================================================================

/// Kind of an observed host mutation. Attribute changes are not observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    CharacterData,
}

/// One low-level mutation notification, as delivered by the host's observer.
#[derive(Debug, Clone)]
pub struct MutationRecord<N> {
    pub kind: MutationKind,
    pub target: N,
    pub added: Vec<N>,
    pub removed: Vec<N>,
}

impl<N> MutationRecord<N> {
    pub fn child_list(target: N, added: Vec<N>, removed: Vec<N>) -> Self {
        Self { kind: MutationKind::ChildList, target, added, removed }
    }

    pub fn character_data(target: N) -> Self {
        Self { kind: MutationKind::CharacterData, target, added: Vec::new(), removed: Vec::new() }
    }
}

// =============================================================================
// Selectors
// =============================================================================

/// Attribute condition of a [`Selector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrMatch {
    Present(&'static str),
    Equals(&'static str, &'static str),
}

/// A compound selector: optional tag plus attribute conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selector {
    pub tag: Option<&'static str>,
    pub attrs: &'static [AttrMatch],
}

impl Selector {
    pub fn matches<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node) -> bool {
        if !dom.is_element(node) {
            return false;
        }

        if let Some(tag) = self.tag {
            match dom.tag_name(node) {
                Some(name) if name.eq_ignore_ascii_case(tag) => {}
                _ => return false,
            }
        }

        self.attrs.iter().all(|cond| match *cond {
            AttrMatch::Present(name) => dom.attribute(node, name).is_some(),
            AttrMatch::Equals(name, value) => dom.attribute(node, name).as_deref() == Some(value),
        })
    }
}

/// True if any selector in the list matches.
#[inline]
pub fn matches_any<D: Dom + ?Sized>(dom: &D, node: &D::Node, selectors: &[Selector]) -> bool {
    selectors.iter().any(|sel| sel.matches(dom, node))
}

// =============================================================================
// Traversal
// =============================================================================

/// Descendants of `scope` in document order, excluding `scope` itself and
/// never entering engine-owned subtrees.
pub fn descendants<D: Dom + ?Sized>(dom: &D, scope: &D::Node) -> Vec<D::Node> {
    let mut out = Vec::new();
    let mut stack: Vec<D::Node> = dom.children(scope).into_iter().rev().collect();

    while let Some(node) = stack.pop() {
        if dom.owned_role(&node).is_some() {
            continue;
        }
        stack.extend(dom.children(&node).into_iter().rev());
        out.push(node);
    }

    out
}

/// All descendants matching any of `selectors`, in document order.
pub fn find_all<D: Dom + ?Sized>(dom: &D, scope: &D::Node, selectors: &[Selector]) -> Vec<D::Node> {
    descendants(dom, scope)
        .into_iter()
        .filter(|node| matches_any(dom, node, selectors))
        .collect()
}

/// First descendant matching any of `selectors`.
pub fn find_first<D: Dom + ?Sized>(dom: &D, scope: &D::Node, selectors: &[Selector]) -> Option<D::Node> {
    let mut stack: Vec<D::Node> = dom.children(scope).into_iter().rev().collect();

    while let Some(node) = stack.pop() {
        if dom.owned_role(&node).is_some() {
            continue;
        }
        if matches_any(dom, &node, selectors) {
            return Some(node);
        }
        stack.extend(dom.children(&node).into_iter().rev());
    }

    None
}

/// Nearest inclusive ancestor matching any of `selectors`.
pub fn closest<D: Dom + ?Sized>(dom: &D, node: &D::Node, selectors: &[Selector]) -> Option<D::Node> {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if matches_any(dom, &candidate, selectors) {
            return Some(candidate);
        }
        current = dom.parent(&candidate);
    }
    None
}

/// Nearest inclusive ancestor that is engine-owned.
pub fn owned_ancestor<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> Option<(D::Node, OwnedRole)> {
    let mut current = Some(node.clone());
    while let Some(candidate) = current {
        if let Some(role) = dom.owned_role(&candidate) {
            return Some((candidate, role));
        }
        current = dom.parent(&candidate);
    }
    None
}

/// True if the node is, or sits inside, engine-injected UI.
#[inline]
pub fn is_within_owned<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> bool {
    owned_ancestor(dom, node).is_some()
}

/// Outermost engine-owned nodes under `scope`, in document order.
pub fn owned_nodes<D: Dom + ?Sized>(dom: &D, scope: &D::Node) -> Vec<(D::Node, OwnedRole)> {
    let mut out = Vec::new();
    let mut stack: Vec<D::Node> = dom.children(scope).into_iter().rev().collect();

    while let Some(node) = stack.pop() {
        if let Some(role) = dom.owned_role(&node) {
            out.push((node, role));
            continue;
        }
        stack.extend(dom.children(&node).into_iter().rev());
    }

    out
}

/// First engine-owned node with `role` under `scope`.
pub fn find_owned<D: Dom + ?Sized>(dom: &D, scope: &D::Node, role: OwnedRole) -> Option<D::Node> {
    owned_nodes(dom, scope)
        .into_iter()
        .find(|(_, r)| *r == role)
        .map(|(node, _)| node)
}

// =============================================================================
// Mutation helpers
// =============================================================================

#[inline]
pub fn append_child<D: Dom + ?Sized>(dom: &mut D, parent: &D::Node, child: &D::Node) {
    dom.insert_before(parent, child, None);
}

/// Detach a node from its parent, if it has one.
pub fn detach<D: Dom + ?Sized>(dom: &mut D, node: &D::Node) {
    if let Some(parent) = dom.parent(node) {
        dom.remove_child(&parent, node);
    }
}

pub fn remove_all_children<D: Dom + ?Sized>(dom: &mut D, node: &D::Node) {
    for child in dom.children(node) {
        dom.remove_child(node, &child);
    }
}

/// Replace the children of `node` with a single text node.
pub fn set_text<D: Dom + ?Sized>(dom: &mut D, node: &D::Node, text: &str) {
    remove_all_children(dom, node);
    let text_node = dom.create_text(text);
    append_child(dom, node, &text_node);
}

/// Create an engine-owned element with the given role.
pub fn create_owned<D: Dom + ?Sized>(dom: &mut D, tag: &str, role: OwnedRole) -> D::Node {
    let node = dom.create_element(tag);
    dom.mark_owned(&node, role);
    node
}

// =============================================================================
// Text
// =============================================================================

/// Concatenated text of a subtree. Images contribute their `alt` text and
/// engine-owned subtrees contribute nothing.
pub fn flatten_text<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> String {
    let mut output = String::new();
    flatten_into(dom, node, &mut output);
    output
}

fn flatten_into<D: Dom + ?Sized>(dom: &D, node: &D::Node, output: &mut String) {
    for child in dom.children(node) {
        if let Some(data) = dom.text_data(&child) {
            output.push_str(&data);
            continue;
        }

        if !dom.is_element(&child) || dom.owned_role(&child).is_some() {
            continue;
        }

        if dom.tag_name(&child).as_deref() == Some("img") {
            if let Some(alt) = dom.attribute(&child, "alt").filter(|alt| !alt.is_empty()) {
                output.push_str(&alt);
                continue;
            }
        }

        flatten_into(dom, &child, output);
    }
}

/// Flattened text with whitespace runs collapsed and the ends trimmed.
pub fn normalized_text<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> String {
    collapse_whitespace(&flatten_text(dom, node))
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotNode;

    const TWEET: Selector = Selector {
        tag: Some("article"),
        attrs: &[AttrMatch::Equals("data-testid", "tweet")],
    };
    const LABELLED: Selector = Selector { tag: None, attrs: &[AttrMatch::Present("aria-label")] };

    fn sample() -> (Document, NodeId) {
        let mut doc = Document::new();
        let body = doc.body();
        let article = doc.append_markup(
            &body,
            &SnapshotNode::element(
                "article",
                &[("data-testid", "tweet")],
                vec![
                    SnapshotNode::element("span", &[("aria-label", "Alice")], vec![SnapshotNode::text("Alice ")]),
                    SnapshotNode::element("img", &[("alt", "🇫🇷")], vec![]),
                    SnapshotNode::text("  and   more "),
                ],
            ),
        );
        (doc, article)
    }

    #[test]
    fn test_selector_matches() {
        let (doc, article) = sample();
        assert!(TWEET.matches(&doc, &article));
        assert!(!LABELLED.matches(&doc, &article));
        assert_eq!(find_all(&doc, &doc.body(), &[TWEET]), vec![article]);
    }

    #[test]
    fn test_flatten_text_uses_alt() {
        let (doc, article) = sample();
        assert_eq!(flatten_text(&doc, &article), "Alice 🇫🇷  and   more ");
        assert_eq!(normalized_text(&doc, &article), "Alice 🇫🇷 and more");
    }

    #[test]
    fn test_owned_subtrees_are_invisible() {
        let (mut doc, article) = sample();
        let label = create_owned(&mut doc, "span", OwnedRole::Label);
        let inner = doc.create_element("span");
        doc.set_attribute(&inner, "aria-label", "Blocked By 🇫🇷");
        append_child(&mut doc, &label, &inner);
        append_child(&mut doc, &article, &label);

        assert_eq!(find_all(&doc, &article, &[LABELLED]).len(), 1);
        assert!(is_within_owned(&doc, &inner));
        assert_eq!(find_owned(&doc, &article, OwnedRole::Label), Some(label));
        assert!(!flatten_text(&doc, &article).contains("Blocked"));
    }

    #[test]
    fn test_closest_is_inclusive() {
        let (doc, article) = sample();
        let span = doc.children(&article)[0];
        assert_eq!(closest(&doc, &span, &[TWEET]), Some(article));
        assert_eq!(closest(&doc, &article, &[TWEET]), Some(article));
        assert_eq!(closest(&doc, &doc.body(), &[TWEET]), None);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), "a b");
        assert_eq!(collapse_whitespace("   "), "");
    }
}
