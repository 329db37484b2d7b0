//! Handle Resolver
//!
//! Derives the canonical lowercase handle of a post's author. Tried in order:
//! the first profile link in the name region, an `@mention` text in the name
//! region, and the first permalink (`/<handle>/status/<id>`) anywhere in the
//! post. Mentions in the post body name other users and are never used. An empty
//! result is a valid outcome: such posts can only be matched by flag.

use crate::dom::{self, Dom};
use crate::selectors;

/// First path segments that belong to the host, not to a user.
const RESERVED_SEGMENTS: &[&str] = &[
    "i",
    "home",
    "explore",
    "search",
    "notifications",
    "messages",
    "settings",
    "hashtag",
];

const PERMALINK_MARKER: &str = "/status/";

/// Resolve the handle of `post` from its live markup.
pub fn resolve_handle<D: Dom + ?Sized>(dom: &D, post: &D::Node) -> String {
    let region = dom::find_first(dom, post, selectors::USER_NAME);
    resolve_with_region(dom, region.as_ref(), post)
}

/// Resolve using an explicit name region (live or a detached copy) before
/// falling back to permalinks in `post`.
pub fn resolve_with_region<D: Dom + ?Sized>(dom: &D, region: Option<&D::Node>, post: &D::Node) -> String {
    if let Some(region) = region {
        if let Some(handle) = from_profile_link(dom, region) {
            return handle;
        }
        if let Some(handle) = from_mention(dom, region) {
            return handle;
        }
    }

    from_permalink(dom, post).unwrap_or_default()
}

fn from_profile_link<D: Dom + ?Sized>(dom: &D, region: &D::Node) -> Option<String> {
    let link = dom::find_first(dom, region, selectors::LINK)?;
    let href = dom.attribute(&link, "href")?;
    first_segment(&href)
        .filter(|segment| !is_reserved(segment))
        .map(canonicalize)
        .filter(|handle| !handle.is_empty())
}

fn from_mention<D: Dom + ?Sized>(dom: &D, scope: &D::Node) -> Option<String> {
    dom::descendants(dom, scope)
        .into_iter()
        .filter_map(|node| dom.text_data(&node))
        .map(|text| text.trim().to_string())
        .filter(|text| text.starts_with('@'))
        .map(|text| canonicalize(&text))
        .find(|handle| !handle.is_empty())
}

fn from_permalink<D: Dom + ?Sized>(dom: &D, post: &D::Node) -> Option<String> {
    dom::find_all(dom, post, selectors::LINK)
        .into_iter()
        .filter_map(|link| dom.attribute(&link, "href"))
        .find(|href| href.contains(PERMALINK_MARKER))
        .and_then(|href| first_segment(&href).map(canonicalize))
        .filter(|handle| !handle.is_empty())
}

/// Lowercase, strip a leading `@`, and keep only `[0-9A-Za-z_]`.
pub fn canonicalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed);
    trimmed
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn is_reserved(segment: &str) -> bool {
    RESERVED_SEGMENTS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(segment))
}

/// Path of an absolute (`https://host/path`) or root-relative (`/path`) href.
pub fn href_path(href: &str) -> &str {
    let rest = match href.find("://") {
        Some(pos) => {
            let after = &href[pos + 3..];
            match after.find('/') {
                Some(slash) => &after[slash..],
                None => "",
            }
        }
        None => href,
    };

    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    &rest[..end]
}

/// First non-empty path segment of an href.
pub fn first_segment(href: &str) -> Option<&str> {
    let path = href_path(href);
    if !path.starts_with('/') {
        return None;
    }
    path.split('/').find(|segment| !segment.is_empty())
}
