//! [`Dom`] over the live browser document.

use ff_core::Dom;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, Node};

/// The page's document, rooted at its body.
pub struct WebDom {
    document: Document,
    root: Node,
}

impl WebDom {
    /// `None` until the document has a body.
    pub fn new(document: Document) -> Option<Self> {
        let root: Node = document.body()?.into();
        Some(Self { document, root })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

fn element(node: &Node) -> Option<&Element> {
    node.dyn_ref::<Element>()
}

impl Dom for WebDom {
    type Node = Node;

    fn root(&self) -> Node {
        self.root.clone()
    }

    fn is_element(&self, node: &Node) -> bool {
        node.node_type() == Node::ELEMENT_NODE
    }

    fn is_connected(&self, node: &Node) -> bool {
        node.is_connected() && self.root.contains(Some(node))
    }

    fn tag_name(&self, node: &Node) -> Option<String> {
        element(node).map(|el| el.local_name())
    }

    fn text_data(&self, node: &Node) -> Option<String> {
        if node.node_type() == Node::TEXT_NODE {
            node.node_value()
        } else {
            None
        }
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        element(node)?.get_attribute(name)
    }

    fn attributes(&self, node: &Node) -> Vec<(String, String)> {
        let Some(el) = element(node) else {
            return Vec::new();
        };
        el.get_attribute_names()
            .iter()
            .filter_map(|name| name.as_string())
            .filter_map(|name| el.get_attribute(&name).map(|value| (name, value)))
            .collect()
    }

    fn set_attribute(&mut self, node: &Node, name: &str, value: &str) {
        if let Some(el) = element(node) {
            if let Err(e) = el.set_attribute(name, value) {
                log::debug!("set_attribute({}) failed: {:?}", name, e);
            }
        }
    }

    fn remove_attribute(&mut self, node: &Node, name: &str) {
        if let Some(el) = element(node) {
            if let Err(e) = el.remove_attribute(name) {
                log::debug!("remove_attribute({}) failed: {:?}", name, e);
            }
        }
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        let list = node.child_nodes();
        (0..list.length()).filter_map(|i| list.item(i)).collect()
    }

    fn create_element(&mut self, tag: &str) -> Node {
        match self.document.create_element(tag) {
            Ok(el) => el.into(),
            Err(e) => {
                // Only reachable with an invalid tag name; an empty text node
                // keeps the caller's tree operations valid.
                log::warn!("create_element({}) failed: {:?}", tag, e);
                self.document.create_text_node("").into()
            }
        }
    }

    fn create_text(&mut self, data: &str) -> Node {
        self.document.create_text_node(data).into()
    }

    fn insert_before(&mut self, parent: &Node, child: &Node, reference: Option<&Node>) {
        if let Err(e) = parent.insert_before(child, reference) {
            log::debug!("insert_before failed: {:?}", e);
        }
    }

    fn remove_child(&mut self, parent: &Node, child: &Node) {
        if let Err(e) = parent.remove_child(child) {
            log::debug!("remove_child failed: {:?}", e);
        }
    }

    fn display(&self, node: &Node) -> Option<String> {
        let value = node
            .dyn_ref::<HtmlElement>()?
            .style()
            .get_property_value("display")
            .ok()?;
        (!value.is_empty()).then_some(value)
    }

    fn set_display(&mut self, node: &Node, value: Option<&str>) {
        let Some(el) = node.dyn_ref::<HtmlElement>() else {
            return;
        };
        let style = el.style();
        let result = match value {
            Some(value) => style.set_property("display", value),
            None => style.remove_property("display").map(|_| ()),
        };
        if let Err(e) = result {
            log::debug!("display update failed: {:?}", e);
        }
    }
}
