//! Display-name extraction
//!
//! Collects every string that could carry the author's flags: labels, the
//! text of direction-marked spans (with emoji images folded back in as their
//! alt text), bare image alts, and the region's combined text.

use crate::dom::{self, Dom};
use crate::selectors;
use crate::snapshot::{self, SnapshotNode};

/// Insertion-ordered, deduplicated candidate names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameSet {
    names: Vec<String>,
}

impl NameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candidate. Empty strings and duplicates are ignored.
    pub fn insert(&mut self, name: String) -> bool {
        if name.is_empty() || self.names.contains(&name) {
            return false;
        }
        self.names.push(name);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.names
    }
}

impl<S: Into<String>> FromIterator<S> for NameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for name in iter {
            set.insert(name.into());
        }
        set
    }
}

/// Extract candidate display names from a post.
///
/// An empty result means the names have not rendered yet, not that the
/// author carries no flags.
pub fn extract_names<D: Dom + ?Sized>(dom: &D, post: &D::Node) -> NameSet {
    let mut names = NameSet::new();

    for region in dom::find_all(dom, post, selectors::USER_NAME) {
        gather_region(dom, &region, &mut names);
    }

    if names.is_empty() {
        if let Some(fallback) = dom::find_first(dom, post, selectors::FALLBACK_NAME) {
            names.insert(dom::normalized_text(dom, &fallback));
        }
    }

    names
}

/// Extract names from the captured children of a name region. Used for
/// masked posts, whose live name region holds the engine's label instead.
pub fn extract_from_snapshot<D: Dom + ?Sized>(dom: &mut D, region: &[SnapshotNode]) -> NameSet {
    let copy = snapshot::detached_copy(dom, "div", &[("data-testid", "User-Name")], region);
    let mut names = NameSet::new();
    gather_region(dom, &copy, &mut names);
    names
}

fn gather_region<D: Dom + ?Sized>(dom: &D, region: &D::Node, names: &mut NameSet) {
    if let Some(label) = dom.attribute(region, "aria-label") {
        names.insert(label);
    }

    for labelled in dom::find_all(dom, region, selectors::LABELLED) {
        if let Some(label) = dom.attribute(&labelled, "aria-label") {
            names.insert(label);
        }
    }

    for text_node in dom::find_all(dom, region, selectors::DIR_AUTO_TEXT) {
        names.insert(dom::normalized_text(dom, &text_node));
    }

    for img in dom::find_all(dom, region, selectors::IMG_WITH_ALT) {
        if let Some(alt) = dom.attribute(&img, "alt") {
            names.insert(alt);
        }
    }

    names.insert(dom::normalized_text(dom, region));
}
