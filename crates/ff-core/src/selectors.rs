//! Structural contract with the host page
//!
//! Fixed selectors for posts and the containers inside them. If the host
//! changes its markup these stop matching and the engine finds no posts;
//! nothing fails.

use crate::dom::{AttrMatch, Selector};

/// Post-like elements.
pub const POST: &[Selector] = &[
    Selector { tag: Some("article"), attrs: &[AttrMatch::Equals("data-testid", "tweet")] },
    Selector { tag: Some("div"), attrs: &[AttrMatch::Equals("data-testid", "tweet")] },
    Selector { tag: Some("article"), attrs: &[AttrMatch::Equals("role", "article")] },
];

/// Author display-name region.
pub const USER_NAME: &[Selector] = &[Selector {
    tag: None,
    attrs: &[AttrMatch::Equals("data-testid", "User-Name")],
}];

pub const AVATAR: &[Selector] = &[Selector {
    tag: None,
    attrs: &[AttrMatch::Equals("data-testid", "Tweet-User-Avatar")],
}];

pub const TWEET_TEXT: &[Selector] = &[Selector {
    tag: None,
    attrs: &[AttrMatch::Equals("data-testid", "tweetText")],
}];

pub const MEDIA: &[Selector] = &[
    Selector { tag: None, attrs: &[AttrMatch::Equals("data-testid", "tweetPhoto")] },
    Selector { tag: None, attrs: &[AttrMatch::Equals("data-testid", "videoPlayer")] },
    Selector { tag: None, attrs: &[AttrMatch::Equals("data-testid", "card.wrapper")] },
];

/// Timeline cell wrappers, in order of preference.
pub const CELL_WRAPPERS: [&[Selector]; 3] = [
    &[Selector { tag: Some("div"), attrs: &[AttrMatch::Equals("data-testid", "cellInnerDiv")] }],
    &[Selector { tag: Some("div"), attrs: &[AttrMatch::Equals("data-testid", "tweetDetail")] }],
    &[Selector { tag: Some("div"), attrs: &[AttrMatch::Equals("role", "presentation")] }],
];

/// Labelled descendants inside a name region.
pub const LABELLED: &[Selector] = &[Selector { tag: None, attrs: &[AttrMatch::Present("aria-label")] }];

/// Direction-marked text containers inside a name region.
pub const DIR_AUTO_TEXT: &[Selector] = &[
    Selector { tag: Some("span"), attrs: &[AttrMatch::Equals("dir", "auto")] },
    Selector { tag: Some("div"), attrs: &[AttrMatch::Equals("dir", "auto")] },
];

pub const IMG_WITH_ALT: &[Selector] = &[Selector { tag: Some("img"), attrs: &[AttrMatch::Present("alt")] }];

/// Fallback name source when a post has no name region.
pub const FALLBACK_NAME: &[Selector] = &[
    Selector {
        tag: Some("a"),
        attrs: &[AttrMatch::Equals("role", "link"), AttrMatch::Equals("dir", "auto")],
    },
    Selector { tag: Some("div"), attrs: &[AttrMatch::Equals("dir", "auto")] },
];

pub const LINK: &[Selector] = &[Selector { tag: Some("a"), attrs: &[AttrMatch::Present("href")] }];

// =============================================================================
// Engine attributes
// =============================================================================

/// Engine-assigned post identity.
pub const POST_ID_ATTR: &str = "data-ff-id";

/// Set on a masked post; value is the block reason marker.
pub const BLOCKED_ATTR: &str = "data-ff-blocked";

/// Prior inline `display` of a node the engine hid.
pub const PRIOR_DISPLAY_ATTR: &str = "data-ff-prior-display";

/// Action dispatched by an injected control.
pub const ACTION_ATTR: &str = "data-ff-action";

/// Input field paired with a save control.
pub const FIELD_ATTR: &str = "data-ff-field";

pub const HIDDEN_BY_ENGINE: &[Selector] = &[Selector {
    tag: None,
    attrs: &[AttrMatch::Present(PRIOR_DISPLAY_ATTR)],
}];

pub const CONTROL: &[Selector] = &[Selector { tag: None, attrs: &[AttrMatch::Present(ACTION_ATTR)] }];
