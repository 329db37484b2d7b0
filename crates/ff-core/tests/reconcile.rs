//! Integration tests for the reconciliation loop, driven on the arena document.

use ff_core::dom::{self, Dom};
use ff_core::selectors::{self, BLOCKED_ATTR, POST_ID_ATTR};
use ff_core::transform;
use ff_core::{
    Classification, ControlAction, Document, Engine, HandlingMode, MemoryStore, NodeId, OwnedRole,
    ProcessingState, Settings, SettingsStore, SnapshotNode,
};
use serde_json::{json, Map, Value};

// =============================================================================
// Fixtures
// =============================================================================

fn name_link(display: &str, handle: &str) -> SnapshotNode {
    let href = format!("/{}", handle);
    SnapshotNode::element(
        "a",
        &[("href", href.as_str()), ("role", "link")],
        vec![SnapshotNode::element("span", &[("dir", "auto")], vec![SnapshotNode::text(display)])],
    )
}

fn post_markup(display: &str, handle: &str) -> SnapshotNode {
    let permalink = format!("/{}/status/1", handle);
    SnapshotNode::element(
        "div",
        &[("data-testid", "cellInnerDiv")],
        vec![SnapshotNode::element(
            "article",
            &[("data-testid", "tweet")],
            vec![
                SnapshotNode::element(
                    "div",
                    &[("data-testid", "Tweet-User-Avatar")],
                    vec![SnapshotNode::element("img", &[("src", "/avatar.png")], vec![])],
                ),
                SnapshotNode::element("div", &[("data-testid", "User-Name")], vec![name_link(display, handle)]),
                SnapshotNode::element(
                    "div",
                    &[("data-testid", "tweetText"), ("dir", "auto")],
                    vec![SnapshotNode::text("hello world")],
                ),
                SnapshotNode::element("div", &[("data-testid", "tweetPhoto")], vec![]),
                SnapshotNode::element("a", &[("href", permalink.as_str())], vec![SnapshotNode::text("1h")]),
            ],
        )],
    )
}

struct Page {
    doc: Document,
    cells: Vec<NodeId>,
    posts: Vec<NodeId>,
}

impl Page {
    fn new(authors: &[(&str, &str)]) -> Self {
        let markup: Vec<SnapshotNode> = authors
            .iter()
            .map(|(display, handle)| post_markup(display, handle))
            .collect();
        Self::from_markup(&markup)
    }

    /// Each markup item is a cell wrapping one post.
    fn from_markup(markup: &[SnapshotNode]) -> Self {
        let mut doc = Document::new();
        let body = doc.body();
        let mut cells = Vec::new();
        let mut posts = Vec::new();
        for cell_markup in markup {
            let cell = doc.append_markup(&body, cell_markup);
            posts.push(doc.children(&cell)[0]);
            cells.push(cell);
        }
        doc.take_records();
        Self { doc, cells, posts }
    }

    fn region(&self, post: usize, selector: &[dom::Selector]) -> NodeId {
        dom::find_first(&self.doc, &self.posts[post], selector).unwrap()
    }

    fn html(&self, post: usize, selector: &[dom::Selector]) -> String {
        self.doc.outer_html(&self.region(post, selector))
    }
}

fn settings(flags: &[&str], blocked: &[&str], mode: HandlingMode) -> Settings {
    Settings {
        selected_flags: flags.iter().map(|f| f.to_string()).collect(),
        blocked_users: blocked.iter().map(|h| h.to_string()).collect(),
        handling_mode: mode,
        ..Settings::default()
    }
}

fn engine(flags: &[&str], blocked: &[&str]) -> Engine<MemoryStore> {
    Engine::new(MemoryStore::with_settings(&settings(flags, blocked, HandlingMode::Hide)).unwrap())
}

fn item(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

/// Feed queued mutation records back to the engine until none remain.
/// Returns the number of rounds that had records.
fn settle(engine: &mut Engine<MemoryStore>, doc: &mut Document) -> usize {
    let mut rounds = 0;
    loop {
        let records = doc.take_records();
        if records.is_empty() {
            return rounds;
        }
        rounds += 1;
        assert!(rounds < 10, "mutation feedback loop did not settle");
        engine.handle_mutations(doc, &records);
    }
}

// =============================================================================
// Matching
// =============================================================================

#[test]
fn test_match_reports_exactly_the_present_glyphs() {
    let mut page = Page::new(&[("Bob 🇫🇷 🇩🇪", "bob")]);
    let mut engine = engine(&["🇫🇷", "🇮🇹", "🇩🇪"], &[]);

    let outcome = engine.process_article(&mut page.doc, &page.posts[0]);
    assert_eq!(outcome, Classification::Flagged(vec!["🇩🇪".to_string(), "🇫🇷".to_string()]));
    assert_eq!(
        engine.record(&page.doc, &page.posts[0]).unwrap().matched_flags,
        vec!["🇩🇪".to_string(), "🇫🇷".to_string()]
    );
}

#[test]
fn test_rainbow_flag_scenario() {
    let mut page = Page::new(&[("Alice 🏳️‍🌈", "alice")]);
    let mut engine = engine(&["🏳️‍🌈"], &[]);

    engine.full_sweep(&mut page.doc);

    assert_eq!(engine.state_of(&page.doc, &page.posts[0]), ProcessingState::Blocked);
    assert_eq!(engine.store().get_all().unwrap().flag_block_counts["🏳️‍🌈"], 1);

    let body = page.region(0, selectors::TWEET_TEXT);
    assert_eq!(dom::flatten_text(&page.doc, &body), "");

    let avatar = page.region(0, selectors::AVATAR);
    let badge = dom::find_owned(&page.doc, &avatar, OwnedRole::Badge).unwrap();
    assert_eq!(dom::flatten_text(&page.doc, &badge), "🏳️‍🌈🚫");

    assert_eq!(page.doc.display(&page.cells[0]).as_deref(), Some("none"));
}

// =============================================================================
// Idempotence and round-trip
// =============================================================================

#[test]
fn test_repeated_sweeps_count_once() {
    let mut page = Page::new(&[("Alice 🇫🇷", "alice")]);
    let mut engine = engine(&["🇫🇷"], &[]);

    engine.full_sweep(&mut page.doc);
    let masked = page.doc.outer_html(&page.posts[0]);
    engine.full_sweep(&mut page.doc);
    engine.rerun(&mut page.doc);

    assert_eq!(page.doc.outer_html(&page.posts[0]), masked);
    let stored = engine.store().get_all().unwrap();
    assert_eq!(stored.flag_block_counts["🇫🇷"], 1);
    assert_eq!(stored.user_stats["alice"].flag_matches, 1);
    assert_eq!(stored.user_stats["alice"].flags, vec!["🇫🇷"]);
}

#[test]
fn test_unmask_restores_markup_and_trigger() {
    let mut page = Page::new(&[("Alice 🇫🇷", "alice")]);
    let mut engine = engine(&[], &[]);

    engine.full_sweep(&mut page.doc);
    let name_before = page.html(0, selectors::USER_NAME);
    let body_before = page.html(0, selectors::TWEET_TEXT);
    let name = page.region(0, selectors::USER_NAME);
    let trigger = dom::find_owned(&page.doc, &name, OwnedRole::Trigger).unwrap();

    engine.store_mut().set(item("selectedFlags", json!(["🇫🇷"]))).unwrap();
    assert!(engine.pump_settings(&mut page.doc));
    assert_eq!(engine.state_of(&page.doc, &page.posts[0]), ProcessingState::Blocked);
    assert_ne!(page.html(0, selectors::USER_NAME), name_before);

    engine.store_mut().set(item("selectedFlags", json!([]))).unwrap();
    assert!(engine.pump_settings(&mut page.doc));

    assert_eq!(page.html(0, selectors::USER_NAME), name_before);
    assert_eq!(page.html(0, selectors::TWEET_TEXT), body_before);
    assert_eq!(page.doc.parent(&trigger), Some(name));
    assert_eq!(page.doc.attribute(&page.posts[0], BLOCKED_ATTR), None);
    assert_eq!(page.doc.display(&page.cells[0]), None);
}

// =============================================================================
// Manual blocks
// =============================================================================

#[test]
fn test_manual_block_without_selected_flags() {
    let mut page = Page::new(&[("Alice", "alice")]);
    let mut engine = engine(&[], &["alice"]);

    let outcome = engine.process_article(&mut page.doc, &page.posts[0]);
    assert_eq!(outcome, Classification::UserBlocked);

    let record = engine.record(&page.doc, &page.posts[0]).unwrap();
    assert!(record.matched_flags.is_empty());
    assert_eq!(page.doc.attribute(&page.posts[0], BLOCKED_ATTR).as_deref(), Some("user"));

    let stored = engine.store().get_all().unwrap();
    assert!(stored.user_stats.is_empty());
    assert!(stored.flag_block_counts.is_empty());
}

#[test]
fn test_manual_block_wins_over_flags() {
    let mut page = Page::new(&[("Alice 🇫🇷", "alice")]);
    let mut engine = engine(&["🇫🇷"], &["alice"]);

    assert_eq!(engine.process_article(&mut page.doc, &page.posts[0]), Classification::UserBlocked);
    assert!(engine.store().get_all().unwrap().flag_block_counts.is_empty());
}

#[test]
fn test_block_and_unblock_from_panel() {
    let mut page = Page::new(&[("Bob", "bob")]);
    let mut engine = engine(&[], &[]);
    engine.full_sweep(&mut page.doc);
    let name_before = page.html(0, selectors::USER_NAME);

    assert!(engine.handle_control(&mut page.doc, &page.posts[0], ControlAction::TogglePanel));
    assert!(engine.handle_control(&mut page.doc, &page.posts[0], ControlAction::BlockUser));

    assert_eq!(engine.state_of(&page.doc, &page.posts[0]), ProcessingState::Blocked);
    let stored = engine.store().get_all().unwrap();
    assert_eq!(stored.blocked_users, vec!["bob"]);
    assert_eq!(stored.user_stats["bob"].manual_blocks, 1);

    let panel = dom::find_owned(&page.doc, &page.posts[0], OwnedRole::Panel).unwrap();
    assert!(page.doc.outer_html(&panel).contains("Unblock @bob"));

    // Our own write comes back as a notification and must not rerun.
    assert!(!engine.pump_settings(&mut page.doc));

    assert!(engine.handle_control(&mut page.doc, &page.posts[0], ControlAction::UnblockUser));
    assert_eq!(engine.state_of(&page.doc, &page.posts[0]), ProcessingState::Checked);
    assert_eq!(page.html(0, selectors::USER_NAME), name_before);
    assert!(engine.store().get_all().unwrap().blocked_users.is_empty());
}

// =============================================================================
// Settings propagation
// =============================================================================

#[test]
fn test_new_flag_applies_without_reload() {
    let mut page = Page::new(&[("Carol 🏳️", "carol"), ("Dave", "dave"), ("Erin 🏳️ fan", "erin")]);
    let mut engine = engine(&[], &[]);
    engine.full_sweep(&mut page.doc);
    assert!(page.posts.iter().all(|p| engine.state_of(&page.doc, p) == ProcessingState::Checked));

    engine.store_mut().set(item("selectedFlags", json!(["🏳️"]))).unwrap();
    assert!(engine.pump_settings(&mut page.doc));

    assert_eq!(engine.state_of(&page.doc, &page.posts[0]), ProcessingState::Blocked);
    assert_eq!(engine.state_of(&page.doc, &page.posts[1]), ProcessingState::Checked);
    assert_eq!(engine.state_of(&page.doc, &page.posts[2]), ProcessingState::Blocked);
    assert_eq!(engine.settings().flag_block_counts["🏳️"], 2);
}

#[test]
fn test_mode_change_uncollapses_cell() {
    let mut page = Page::new(&[("Alice 🇫🇷", "alice")]);
    let mut engine = engine(&["🇫🇷"], &[]);
    engine.full_sweep(&mut page.doc);
    assert_eq!(page.doc.display(&page.cells[0]).as_deref(), Some("none"));

    engine.store_mut().set(item("handlingMode", json!("block"))).unwrap();
    assert!(engine.pump_settings(&mut page.doc));

    assert_eq!(engine.config().handling_mode, HandlingMode::Block);
    assert_eq!(page.doc.display(&page.cells[0]), None);
    assert_eq!(engine.state_of(&page.doc, &page.posts[0]), ProcessingState::Blocked);
    assert_eq!(engine.settings().flag_block_counts["🇫🇷"], 1);
}

#[test]
fn test_popup_note_reaches_open_panel() {
    let mut page = Page::new(&[("Bob", "bob")]);
    let mut engine = engine(&[], &[]);
    engine.full_sweep(&mut page.doc);
    engine.handle_control(&mut page.doc, &page.posts[0], ControlAction::TogglePanel);

    engine
        .store_mut()
        .set(item("userStats", json!({"bob": {"note": "spam account", "nickname": "B"}})))
        .unwrap();
    assert!(!engine.pump_settings(&mut page.doc));

    let panel = dom::find_owned(&page.doc, &page.posts[0], OwnedRole::Panel).unwrap();
    let html = page.doc.outer_html(&panel);
    assert!(html.contains("value=\"spam account\""));
    assert!(html.contains("@bob (B)"));
}

#[test]
fn test_note_saved_from_panel() {
    let mut page = Page::new(&[("Bob", "bob")]);
    let mut engine = engine(&[], &[]);
    engine.full_sweep(&mut page.doc);
    engine.handle_control(&mut page.doc, &page.posts[0], ControlAction::TogglePanel);

    let note = "x".repeat(600);
    assert!(engine.handle_control(&mut page.doc, &page.posts[0], ControlAction::SetNote(note)));
    assert_eq!(engine.store().get_all().unwrap().user_stats["bob"].note.len(), 500);
    assert_eq!(engine.settings().user_stats["bob"].note.len(), 500);
}

#[test]
fn test_clicks_resolve_to_controls() {
    let mut page = Page::new(&[("Bob", "bob")]);
    let mut engine = engine(&[], &[]);
    engine.full_sweep(&mut page.doc);

    let trigger = dom::find_owned(&page.doc, &page.posts[0], OwnedRole::Trigger).unwrap();
    let (post, action) = transform::resolve_control(&page.doc, &trigger, |_, _| None).unwrap();
    assert_eq!(post, page.posts[0]);
    assert_eq!(action, ControlAction::TogglePanel);
    engine.handle_control(&mut page.doc, &post, action);

    let panel = dom::find_owned(&page.doc, &page.posts[0], OwnedRole::Panel).unwrap();
    let parts = dom::descendants(&page.doc, &panel);
    let field = |name: &str| {
        parts
            .iter()
            .copied()
            .find(|node| page.doc.attribute(node, selectors::FIELD_ATTR).as_deref() == Some(name))
            .unwrap()
    };
    let button = |action: &str| {
        parts
            .iter()
            .copied()
            .find(|node| page.doc.attribute(node, selectors::ACTION_ATTR).as_deref() == Some(action))
            .unwrap()
    };
    let nickname_input = field("nickname");
    let save_nickname = button("save-nickname");
    let block = button("block");

    let live = transform::resolve_control(&page.doc, &block, |_, _| Some("ignored".into()));
    assert_eq!(live.map(|(_, action)| action), Some(ControlAction::BlockUser));

    let live = transform::resolve_control(&page.doc, &save_nickname, |_, _| Some("Live".into()));
    assert_eq!(live.map(|(_, action)| action), Some(ControlAction::SetNickname("Live".into())));

    page.doc.set_attribute(&nickname_input, "value", "Bobby");
    let (post, action) = transform::resolve_control(&page.doc, &save_nickname, |_, _| None).unwrap();
    assert_eq!(action, ControlAction::SetNickname("Bobby".into()));
    assert!(engine.handle_control(&mut page.doc, &post, action));
    assert_eq!(engine.settings().user_stats["bob"].nickname, "Bobby");

    let text = page.region(0, selectors::TWEET_TEXT);
    assert!(transform::resolve_control(&page.doc, &text, |_, _| None).is_none());
}

#[test]
fn test_panel_for_unknown_author_has_no_user_controls() {
    let mut page = Page::from_markup(&[SnapshotNode::element(
        "div",
        &[("data-testid", "cellInnerDiv")],
        vec![SnapshotNode::element(
            "article",
            &[("data-testid", "tweet")],
            vec![SnapshotNode::element(
                "div",
                &[("data-testid", "User-Name")],
                vec![SnapshotNode::element("span", &[("dir", "auto")], vec![SnapshotNode::text("Anon")])],
            )],
        )],
    )]);
    let mut engine = engine(&[], &[]);
    engine.full_sweep(&mut page.doc);
    assert!(engine.record(&page.doc, &page.posts[0]).unwrap().handle.is_none());

    assert!(engine.handle_control(&mut page.doc, &page.posts[0], ControlAction::TogglePanel));
    let panel = dom::find_owned(&page.doc, &page.posts[0], OwnedRole::Panel).unwrap();
    let html = page.doc.outer_html(&panel);
    assert!(html.contains("Unknown author"));
    assert!(!html.contains("data-ff-action"));
    assert!(!html.contains("data-ff-field"));
}

#[test]
fn test_panel_survives_reclassification() {
    let mut page = Page::new(&[("Alice 🇫🇷", "alice")]);
    let mut engine = engine(&["🇫🇷"], &[]);
    engine.full_sweep(&mut page.doc);

    assert!(engine.handle_control(&mut page.doc, &page.posts[0], ControlAction::TogglePanel));
    engine.rerun(&mut page.doc);
    engine.store_mut().set(item("selectedFlags", json!([]))).unwrap();
    engine.pump_settings(&mut page.doc);

    assert!(engine.record(&page.doc, &page.posts[0]).unwrap().exposed);
    assert!(dom::find_owned(&page.doc, &page.posts[0], OwnedRole::Panel).is_some());
}

// =============================================================================
// Incremental mutations
// =============================================================================

#[test]
fn test_self_mutations_settle() {
    let mut page = Page::new(&[("Alice 🇫🇷", "alice"), ("Bob", "bob")]);
    let mut engine = engine(&["🇫🇷"], &[]);

    engine.full_sweep(&mut page.doc);
    assert!(settle(&mut engine, &mut page.doc) <= 1);

    engine.handle_control(&mut page.doc, &page.posts[0], ControlAction::TogglePanel);
    assert!(settle(&mut engine, &mut page.doc) <= 1);

    engine.store_mut().set(item("selectedFlags", json!([]))).unwrap();
    engine.pump_settings(&mut page.doc);
    assert!(settle(&mut engine, &mut page.doc) <= 2);

    assert_eq!(engine.settings().flag_block_counts["🇫🇷"], 1);
}

#[test]
fn test_new_posts_are_classified() {
    let mut page = Page::new(&[]);
    let mut engine = engine(&["🇫🇷"], &[]);
    engine.full_sweep(&mut page.doc);

    let body = page.doc.body();
    let cell = page.doc.append_markup(&body, &post_markup("Zoe 🇫🇷", "zoe"));
    let post = page.doc.children(&cell)[0];
    let records = page.doc.take_records();
    let report = engine.handle_mutations(&mut page.doc, &records);

    assert_eq!(report.blocked, 1);
    assert_eq!(engine.state_of(&page.doc, &post), ProcessingState::Blocked);
}

#[test]
fn test_in_place_text_edit_reclassifies() {
    let mut page = Page::new(&[("Carol", "carol")]);
    let mut engine = engine(&["🇨🇦"], &[]);
    engine.full_sweep(&mut page.doc);
    settle(&mut engine, &mut page.doc);

    let name = page.region(0, selectors::USER_NAME);
    let span = dom::find_first(&page.doc, &name, selectors::DIR_AUTO_TEXT).unwrap();
    let text = page.doc.children(&span)[0];
    page.doc.set_text_data(&text, "Carol 🇨🇦");

    let records = page.doc.take_records();
    engine.handle_mutations(&mut page.doc, &records);
    assert_eq!(engine.state_of(&page.doc, &page.posts[0]), ProcessingState::Blocked);
}

#[test]
fn test_masked_post_ignores_inner_changes() {
    let mut page = Page::new(&[("Alice 🇫🇷", "alice")]);
    let mut engine = engine(&["🇫🇷"], &[]);
    engine.full_sweep(&mut page.doc);
    settle(&mut engine, &mut page.doc);

    let link = dom::find_all(&page.doc, &page.posts[0], selectors::LINK).pop().unwrap();
    let stamp = page.doc.children(&link)[0];
    page.doc.set_text_data(&stamp, "2h");

    let records = page.doc.take_records();
    let report = engine.handle_mutations(&mut page.doc, &records);
    assert_eq!(report.examined, 0);
}

#[test]
fn test_pending_post_retried_on_next_mutation() {
    // Name region present but not rendered yet.
    let mut page = Page::from_markup(&[SnapshotNode::element(
        "div",
        &[("data-testid", "cellInnerDiv")],
        vec![SnapshotNode::element(
            "article",
            &[("data-testid", "tweet")],
            vec![SnapshotNode::element("div", &[("data-testid", "User-Name")], vec![])],
        )],
    )]);
    let mut engine = engine(&["🇫🇷"], &[]);

    assert_eq!(engine.process_article(&mut page.doc, &page.posts[0]), Classification::Pending);
    assert_eq!(engine.state_of(&page.doc, &page.posts[0]), ProcessingState::Unset);

    let name = page.region(0, selectors::USER_NAME);
    page.doc.append_markup(&name, &name_link("Frank 🇫🇷", "frank"));
    let records = page.doc.take_records();
    engine.handle_mutations(&mut page.doc, &records);

    assert_eq!(engine.state_of(&page.doc, &page.posts[0]), ProcessingState::Blocked);
    let record = engine.record(&page.doc, &page.posts[0]).unwrap();
    assert_eq!(record.handle.as_deref(), Some("frank"));
}

#[test]
fn test_recycled_element_is_classified_fresh() {
    let mut page = Page::new(&[("Alice 🇫🇷", "alice")]);
    let mut engine = engine(&["🇫🇷"], &[]);
    engine.full_sweep(&mut page.doc);
    settle(&mut engine, &mut page.doc);

    // The host reuses the element for another author and drops our marker.
    let post = page.posts[0];
    page.doc.remove_attribute(&post, BLOCKED_ATTR);
    let name = page.region(0, selectors::USER_NAME);
    dom::remove_all_children(&mut page.doc, &name);
    page.doc.append_markup(&name, &name_link("Erin", "erin"));
    let body = page.region(0, selectors::TWEET_TEXT);
    dom::remove_all_children(&mut page.doc, &body);
    page.doc.append_markup(&body, &SnapshotNode::text("a different post"));

    let records = page.doc.take_records();
    engine.handle_mutations(&mut page.doc, &records);

    assert_eq!(engine.state_of(&page.doc, &post), ProcessingState::Checked);
    let record = engine.record(&page.doc, &post).unwrap();
    assert!(record.mask.is_none());
    assert_eq!(record.handle.as_deref(), Some("erin"));
    assert!(dom::find_owned(&page.doc, &post, OwnedRole::Badge).is_none());
    assert!(dom::find_owned(&page.doc, &post, OwnedRole::Toggle).is_none());
    assert_eq!(dom::normalized_text(&page.doc, &body), "a different post");
    assert_eq!(page.doc.display(&page.cells[0]), None);
}

#[test]
fn test_removed_posts_are_forgotten() {
    let authors: Vec<(String, String)> = (0..50)
        .map(|i| (format!("User {} 🇫🇷", i), format!("user{}", i)))
        .collect();
    let authors: Vec<(&str, &str)> = authors.iter().map(|(d, h)| (d.as_str(), h.as_str())).collect();
    let mut page = Page::new(&[]);
    let mut engine = engine(&["🇫🇷"], &[]);
    engine.full_sweep(&mut page.doc);

    let body = page.doc.body();
    let cells: Vec<NodeId> = authors
        .iter()
        .map(|(display, handle)| page.doc.append_markup(&body, &post_markup(display, handle)))
        .collect();
    settle(&mut engine, &mut page.doc);
    assert_eq!(engine.tracked_posts(), 50);

    // Scrolled out of the virtualized timeline, with no sweep in between.
    for cell in &cells[..49] {
        dom::detach(&mut page.doc, cell);
    }
    settle(&mut engine, &mut page.doc);
    assert_eq!(engine.tracked_posts(), 1);

    // So does removing the post element itself.
    let wrapper = page.doc.children(&cells[49])[0];
    page.doc.remove_child(&cells[49], &wrapper);
    settle(&mut engine, &mut page.doc);
    assert_eq!(engine.tracked_posts(), 0);
}

#[test]
fn test_moved_post_keeps_its_record() {
    let mut page = Page::new(&[("Alice", "alice"), ("Bob", "bob")]);
    let mut engine = engine(&["🇫🇷"], &[]);
    engine.full_sweep(&mut page.doc);
    settle(&mut engine, &mut page.doc);
    let id = page.doc.attribute(&page.posts[0], POST_ID_ATTR);

    let body = page.doc.body();
    page.doc.insert_before(&body, &page.cells[0], None);
    settle(&mut engine, &mut page.doc);

    assert_eq!(engine.tracked_posts(), 2);
    assert_eq!(page.doc.attribute(&page.posts[0], POST_ID_ATTR), id);
    assert_eq!(engine.state_of(&page.doc, &page.posts[0]), ProcessingState::Checked);
}

// =============================================================================
// Failure handling
// =============================================================================

#[test]
fn test_storage_failure_is_not_fatal() {
    let mut store = MemoryStore::with_settings(&settings(&["🇫🇷"], &[], HandlingMode::Hide)).unwrap();
    store.set_read_only(true);
    let mut engine = Engine::new(store);
    let mut page = Page::new(&[("Alice 🇫🇷", "alice")]);

    let report = engine.full_sweep(&mut page.doc);
    assert_eq!(report.blocked, 1);
    assert_eq!(engine.settings().flag_block_counts["🇫🇷"], 1);
    assert_eq!(engine.settings().user_stats["alice"].flag_matches, 1);
    assert!(engine.store().get_all().unwrap().flag_block_counts.is_empty());

    assert!(engine.handle_control(&mut page.doc, &page.posts[0], ControlAction::BlockUser));
    assert!(engine.settings().is_blocked("alice"));
}

#[test]
fn test_unknown_markup_finds_nothing() {
    let mut doc = Document::new();
    let body = doc.body();
    doc.append_markup(
        &body,
        &SnapshotNode::element("section", &[("data-testid", "post")], vec![SnapshotNode::text("Alice 🇫🇷")]),
    );
    let mut engine = engine(&["🇫🇷"], &[]);
    let report = engine.full_sweep(&mut doc);
    assert_eq!(report.examined, 0);
    assert_eq!(engine.tracked_posts(), 0);
}
