//! Transformation Engine
//!
//! Reversible visual transformations on a single post:
//!
//! - **mask**: the name is replaced by a "Blocked By ..." label, the avatar by
//!   a flag badge, the body by a zero-width placeholder; media is hidden and a
//!   toggle control is attached to the post.
//! - **clear**: the reverse, rebuilt from the structured snapshot taken when
//!   the mask was applied. Controls that were nested in the name region are
//!   put back at their original position.
//! - **expand**: an inline info panel, independent of the mask state.
//!
//! Every step is skipped when its target container is missing, so a partial
//! markup match degrades to a partial mask instead of an error.

use crate::dom::{self, Dom};
use crate::engine::PostRecord;
use crate::selectors::{self, ACTION_ATTR, BLOCKED_ATTR, FIELD_ATTR, PRIOR_DISPLAY_ATTR};
use crate::settings::{UserStats, NICKNAME_MAX_CHARS, NOTE_MAX_CHARS};
use crate::snapshot::{self, SnapshotNode};
use crate::stats;
use crate::types::{BlockReason, ControlAction, HandlingMode, OwnedRole};

pub const PROHIBITED: &str = "🚫";
pub const PLACEHOLDER_TEXT: &str = "\u{200B}";
pub const TRIGGER_TEXT: &str = "ⓘ";
pub const TOGGLE_TEXT: &str = "Show details";

// =============================================================================
// Mask Snapshot
// =============================================================================

/// Original contents of the containers a mask replaced. `None` means the
/// container was absent when the mask was applied and was left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskSnapshot {
    pub reason: BlockReason,
    pub name: Option<Vec<SnapshotNode>>,
    pub body: Option<Vec<SnapshotNode>>,
    pub avatar: Option<Vec<SnapshotNode>>,
}

/// Text of the label replacing the author name.
pub fn label_text(reason: &BlockReason) -> String {
    match reason {
        BlockReason::Flags(flags) => format!("Blocked By {}", flags.join(" ")),
        BlockReason::User => "Blocked By You".to_string(),
    }
}

/// Text of the badge replacing the avatar.
pub fn badge_text(reason: &BlockReason) -> String {
    match reason {
        BlockReason::Flags(flags) => format!("{}{}", flags.concat(), PROHIBITED),
        BlockReason::User => PROHIBITED.to_string(),
    }
}

/// Whether the post currently carries a mask this engine applied.
pub fn is_masked<D: Dom + ?Sized>(dom: &D, post: &D::Node, record: &PostRecord) -> bool {
    record.mask.is_some() && dom.attribute(post, BLOCKED_ATTR).is_some()
}

// =============================================================================
// Mask / Clear
// =============================================================================

/// Mask `post`. Returns true only when the mask was newly applied; a post
/// that is already masked is relabeled if the reason changed and otherwise
/// left untouched.
pub fn apply_mask<D: Dom + ?Sized>(
    dom: &mut D,
    post: &D::Node,
    record: &mut PostRecord,
    reason: &BlockReason,
) -> bool {
    if is_masked(dom, post, record) {
        let current = record.mask.as_ref().map(|mask| &mask.reason);
        if current != Some(reason) {
            relabel(dom, post, reason);
            if let Some(mask) = record.mask.as_mut() {
                mask.reason = reason.clone();
            }
            dom.set_attribute(post, BLOCKED_ATTR, reason.marker());
        }
        return false;
    }

    let mut mask = MaskSnapshot {
        reason: reason.clone(),
        name: None,
        body: None,
        avatar: None,
    };

    if let Some(name) = dom::find_first(dom, post, selectors::USER_NAME) {
        mask.name = Some(snapshot::capture_children(dom, &name));
        let controls = snapshot::take_owned(dom, &name, OwnedRole::is_control);
        dom::remove_all_children(dom, &name);
        let label = owned_text(dom, "span", OwnedRole::Label, &label_text(reason));
        dom::append_child(dom, &name, &label);
        for (control, _) in controls {
            dom::append_child(dom, &name, &control);
        }
    }

    if let Some(avatar) = dom::find_first(dom, post, selectors::AVATAR) {
        mask.avatar = Some(snapshot::capture_children(dom, &avatar));
        dom::remove_all_children(dom, &avatar);
        let badge = owned_text(dom, "span", OwnedRole::Badge, &badge_text(reason));
        dom::append_child(dom, &avatar, &badge);
    }

    if let Some(body) = dom::find_first(dom, post, selectors::TWEET_TEXT) {
        mask.body = Some(snapshot::capture_children(dom, &body));
        dom::remove_all_children(dom, &body);
        let placeholder = owned_text(dom, "span", OwnedRole::Placeholder, PLACEHOLDER_TEXT);
        dom::append_child(dom, &body, &placeholder);
    }

    for media in dom::find_all(dom, post, selectors::MEDIA) {
        hide_node(dom, &media);
    }

    if dom::find_owned(dom, post, OwnedRole::Toggle).is_none() {
        let toggle = owned_text(dom, "button", OwnedRole::Toggle, TOGGLE_TEXT);
        dom.set_attribute(&toggle, ACTION_ATTR, "toggle-panel");
        dom::append_child(dom, post, &toggle);
    }

    dom.set_attribute(post, BLOCKED_ATTR, reason.marker());
    record.mask = Some(mask);
    true
}

/// Restore the post from its mask snapshot. Returns false when there was
/// nothing to clear.
pub fn clear_mask<D: Dom + ?Sized>(dom: &mut D, post: &D::Node, record: &mut PostRecord) -> bool {
    let Some(mask) = record.mask.take() else {
        return false;
    };

    restore_region(dom, post, selectors::USER_NAME, mask.name.as_deref());
    restore_region(dom, post, selectors::AVATAR, mask.avatar.as_deref());
    restore_region(dom, post, selectors::TWEET_TEXT, mask.body.as_deref());

    for hidden in dom::find_all(dom, post, selectors::HIDDEN_BY_ENGINE) {
        unhide_node(dom, &hidden);
    }

    if let Some(toggle) = dom::find_owned(dom, post, OwnedRole::Toggle) {
        dom::detach(dom, &toggle);
    }

    let cell = cell_for(dom, post);
    unhide_node(dom, &cell);
    dom.remove_attribute(post, BLOCKED_ATTR);
    true
}

/// Drop mask artifacts without restoring the snapshot. Used when the host
/// recycled the element: the snapshot describes content that is gone.
pub fn discard_mask<D: Dom + ?Sized>(dom: &mut D, post: &D::Node, record: &mut PostRecord) {
    record.mask = None;

    for (node, role) in dom::owned_nodes(dom, post) {
        if !role.is_control() || role == OwnedRole::Toggle {
            dom::detach(dom, &node);
        }
    }
    for hidden in dom::find_all(dom, post, selectors::HIDDEN_BY_ENGINE) {
        unhide_node(dom, &hidden);
    }

    let cell = cell_for(dom, post);
    unhide_node(dom, &cell);
    dom.remove_attribute(post, BLOCKED_ATTR);
}

fn restore_region<D: Dom + ?Sized>(
    dom: &mut D,
    post: &D::Node,
    selector: &[dom::Selector],
    saved: Option<&[SnapshotNode]>,
) {
    let Some(saved) = saved else {
        return;
    };
    if let Some(container) = dom::find_first(dom, post, selector) {
        snapshot::restore_children(dom, &container, saved, OwnedRole::is_control);
    }
}

fn relabel<D: Dom + ?Sized>(dom: &mut D, post: &D::Node, reason: &BlockReason) {
    if let Some(label) = dom::find_owned(dom, post, OwnedRole::Label) {
        dom::set_text(dom, &label, &label_text(reason));
    }
    if let Some(badge) = dom::find_owned(dom, post, OwnedRole::Badge) {
        dom::set_text(dom, &badge, &badge_text(reason));
    }
}

// =============================================================================
// Presentation
// =============================================================================

/// Collapse the timeline cell of a masked post in `Hide` mode; keep it
/// visible otherwise.
pub fn apply_presentation<D: Dom + ?Sized>(
    dom: &mut D,
    post: &D::Node,
    record: &PostRecord,
    mode: HandlingMode,
) {
    let cell = cell_for(dom, post);
    if mode == HandlingMode::Hide && is_masked(dom, post, record) {
        hide_node(dom, &cell);
    } else {
        unhide_node(dom, &cell);
    }
}

/// Nearest timeline cell wrapper, or the post itself.
pub fn cell_for<D: Dom + ?Sized>(dom: &D, post: &D::Node) -> D::Node {
    selectors::CELL_WRAPPERS
        .iter()
        .find_map(|wrapper| dom::closest(dom, post, wrapper))
        .unwrap_or_else(|| post.clone())
}

/// Hide a node, remembering its inline `display` the first time.
pub fn hide_node<D: Dom + ?Sized>(dom: &mut D, node: &D::Node) {
    if dom.attribute(node, PRIOR_DISPLAY_ATTR).is_none() {
        let prior = dom.display(node).unwrap_or_default();
        dom.set_attribute(node, PRIOR_DISPLAY_ATTR, &prior);
    }
    dom.set_display(node, Some("none"));
}

/// Undo [`hide_node`]. Nodes the engine did not hide are left alone.
pub fn unhide_node<D: Dom + ?Sized>(dom: &mut D, node: &D::Node) {
    let Some(prior) = dom.attribute(node, PRIOR_DISPLAY_ATTR) else {
        return;
    };
    let value = if prior.is_empty() { None } else { Some(prior.as_str()) };
    dom.set_display(node, value);
    dom.remove_attribute(node, PRIOR_DISPLAY_ATTR);
}

// =============================================================================
// Controls
// =============================================================================

/// Inject the info-panel trigger into the name region, once.
pub fn ensure_trigger<D: Dom + ?Sized>(dom: &mut D, post: &D::Node) -> bool {
    let Some(name) = dom::find_first(dom, post, selectors::USER_NAME) else {
        return false;
    };
    if dom::find_owned(dom, &name, OwnedRole::Trigger).is_some() {
        return false;
    }

    let trigger = owned_text(dom, "span", OwnedRole::Trigger, TRIGGER_TEXT);
    dom.set_attribute(&trigger, ACTION_ATTR, "toggle-panel");
    dom.set_attribute(&trigger, "role", "button");
    dom.set_attribute(&trigger, "title", "FlagFilter details");
    dom::append_child(dom, &name, &trigger);
    true
}

/// Everything the info panel shows about one author.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelModel {
    pub handle: String,
    pub nickname: String,
    pub note: String,
    pub score: u32,
    pub flags: Vec<String>,
    pub flag_matches: u32,
    pub manual_blocks: u32,
    pub blocked: bool,
}

impl PanelModel {
    pub fn new(handle: &str, stats: Option<&UserStats>, blocked: bool) -> Self {
        let mut model = Self {
            handle: handle.to_string(),
            blocked,
            ..Self::default()
        };
        if let Some(stats) = stats {
            model.nickname = stats.nickname.clone();
            model.note = stats.note.clone();
            model.score = stats::score(stats);
            model.flags = stats.flags.clone();
            model.flag_matches = stats.flag_matches;
            model.manual_blocks = stats.manual_blocks;
        }
        model
    }
}

/// Open or close the info panel. Returns the new exposed state.
pub fn toggle_expand<D: Dom + ?Sized>(
    dom: &mut D,
    post: &D::Node,
    record: &mut PostRecord,
    model: PanelModel,
) -> bool {
    if record.exposed {
        if let Some(panel) = dom::find_owned(dom, post, OwnedRole::Panel) {
            dom::detach(dom, &panel);
        }
        record.exposed = false;
        record.panel = None;
    } else {
        let panel = render_panel(dom, &model);
        dom::append_child(dom, post, &panel);
        record.exposed = true;
        record.panel = Some(model);
    }
    record.exposed
}

/// Re-render an open panel if its model changed or the host dropped it.
/// Returns true when the panel was rebuilt.
pub fn refresh_panel<D: Dom + ?Sized>(
    dom: &mut D,
    post: &D::Node,
    record: &mut PostRecord,
    model: PanelModel,
) -> bool {
    if !record.exposed {
        return false;
    }

    let existing = dom::find_owned(dom, post, OwnedRole::Panel);
    if existing.is_some() && record.panel.as_ref() == Some(&model) {
        return false;
    }
    if let Some(existing) = existing {
        dom::detach(dom, &existing);
    }

    let panel = render_panel(dom, &model);
    dom::append_child(dom, post, &panel);
    record.panel = Some(model);
    true
}

/// Close the panel, if open.
pub fn close_panel<D: Dom + ?Sized>(dom: &mut D, post: &D::Node, record: &mut PostRecord) {
    if let Some(panel) = dom::find_owned(dom, post, OwnedRole::Panel) {
        dom::detach(dom, &panel);
    }
    record.exposed = false;
    record.panel = None;
}

/// Build a detached panel for `model`.
pub fn render_panel<D: Dom + ?Sized>(dom: &mut D, model: &PanelModel) -> D::Node {
    let panel = dom::create_owned(dom, "div", OwnedRole::Panel);
    dom.set_attribute(&panel, "role", "group");

    let mut title = if model.handle.is_empty() {
        "Unknown author".to_string()
    } else {
        format!("@{}", model.handle)
    };
    if !model.nickname.is_empty() {
        title.push_str(&format!(" ({})", model.nickname));
    }
    let flags = if model.flags.is_empty() {
        "none".to_string()
    } else {
        model.flags.join(" ")
    };

    for line in [
        title,
        format!("Score: {}", model.score),
        format!("Flags: {}", flags),
        format!("Flag matches: {} / Manual blocks: {}", model.flag_matches, model.manual_blocks),
    ] {
        let row = dom.create_element("div");
        dom::set_text(dom, &row, &line);
        dom::append_child(dom, &panel, &row);
    }

    // Per-user controls need someone to attach to.
    if model.handle.is_empty() {
        return panel;
    }

    let (action, caption) = if model.blocked {
        ("unblock", format!("Unblock @{}", model.handle))
    } else {
        ("block", format!("Block @{}", model.handle))
    };
    let block = panel_button(dom, action, &caption);
    dom::append_child(dom, &panel, &block);

    let note = panel_input(dom, "note", &model.note, NOTE_MAX_CHARS);
    dom::append_child(dom, &panel, &note);
    let save_note = panel_button(dom, "save-note", "Save note");
    dom::append_child(dom, &panel, &save_note);

    let nickname = panel_input(dom, "nickname", &model.nickname, NICKNAME_MAX_CHARS);
    dom::append_child(dom, &panel, &nickname);
    let save_nickname = panel_button(dom, "save-nickname", "Save nickname");
    dom::append_child(dom, &panel, &save_nickname);

    panel
}

fn panel_button<D: Dom + ?Sized>(dom: &mut D, action: &str, caption: &str) -> D::Node {
    let button = dom.create_element("button");
    dom.set_attribute(&button, ACTION_ATTR, action);
    dom.set_attribute(&button, "type", "button");
    dom::set_text(dom, &button, caption);
    button
}

fn panel_input<D: Dom + ?Sized>(dom: &mut D, field: &str, value: &str, max: usize) -> D::Node {
    let input = dom.create_element("input");
    dom.set_attribute(&input, "type", "text");
    dom.set_attribute(&input, FIELD_ATTR, field);
    dom.set_attribute(&input, "maxlength", &max.to_string());
    dom.set_attribute(&input, "placeholder", field);
    dom.set_attribute(&input, "value", value);
    input
}

fn owned_text<D: Dom + ?Sized>(dom: &mut D, tag: &str, role: OwnedRole, text: &str) -> D::Node {
    let node = dom::create_owned(dom, tag, role);
    dom::set_text(dom, &node, text);
    node
}

// =============================================================================
// Control dispatch
// =============================================================================

/// Resolve the target of a click to the post it belongs to and the action of
/// the injected control it landed on. Save controls carry the text of the
/// panel input with the matching `data-ff-field`; `field_value` reads its
/// live value, falling back to the `value` attribute.
pub fn resolve_control<D, F>(dom: &D, target: &D::Node, field_value: F) -> Option<(D::Node, ControlAction)>
where
    D: Dom + ?Sized,
    F: Fn(&D, &D::Node) -> Option<String>,
{
    let control = dom::closest(dom, target, selectors::CONTROL)?;
    let (owner, _) = dom::owned_ancestor(dom, &control)?;
    let action = dom.attribute(&control, ACTION_ATTR)?;
    let post = dom::closest(dom, &owner, selectors::POST)?;

    let input = action.strip_prefix("save-").and_then(|field| {
        let input = dom::descendants(dom, &owner)
            .into_iter()
            .find(|node| dom.attribute(node, FIELD_ATTR).as_deref() == Some(field))?;
        field_value(dom, &input).or_else(|| dom.attribute(&input, "value"))
    });

    let action = ControlAction::from_attr(&action, input)?;
    Some((post, action))
}
