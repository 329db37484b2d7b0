//! Reconciliation Loop
//!
//! [`Engine`] is the explicit context object: it owns the settings store, a
//! subscription to its change notifications, the in-memory filter state, and
//! one [`PostRecord`] per post element it has seen. Nodes are never held
//! between calls; posts are tied to their record by the `data-ff-id`
//! attribute.
//!
//! Entry points:
//!
//! - [`Engine::full_sweep`]: classify every post in the tree.
//! - [`Engine::handle_mutations`]: map a batch of host mutations to the posts
//!   that need reclassification, ignoring the engine's own writes.
//! - [`Engine::pump_settings`]: drain store notifications; a change to the
//!   flags, the mode or the blocked-user list reruns the sweep.
//! - [`Engine::handle_control`]: actions from injected controls.

use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc::Receiver;

use crate::dom::{self, Dom, MutationKind, MutationRecord};
use crate::error::StoreError;
use crate::handle;
use crate::matcher;
use crate::names;
use crate::selectors::{self, BLOCKED_ATTR, POST_ID_ATTR};
use crate::settings::{SettingKey, Settings, SettingsChange, SettingsStore};
use crate::snapshot;
use crate::stats;
use crate::transform::{self, MaskSnapshot, PanelModel};
use crate::types::{BlockReason, Classification, ControlAction, HandlingMode, PostId, ProcessingState};

// =============================================================================
// State
// =============================================================================

/// Filter state derived from the settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub selected_flags: BTreeSet<String>,
    pub handling_mode: HandlingMode,
}

impl FilterConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            selected_flags: settings.selected_flags.iter().cloned().collect(),
            handling_mode: settings.handling_mode,
        }
    }
}

/// Engine-side state of one post element.
#[derive(Debug, Clone, Default)]
pub struct PostRecord {
    pub state: ProcessingState,
    /// Resolved handle, cached only once non-empty.
    pub handle: Option<String>,
    /// Present while the post is masked.
    pub mask: Option<MaskSnapshot>,
    /// Info panel open. Reclassification never closes it.
    pub exposed: bool,
    /// Model the open panel was last rendered from.
    pub panel: Option<PanelModel>,
    /// Flags that caused the current mask; empty for manual blocks.
    pub matched_flags: Vec<String>,
}

impl PostRecord {
    pub fn block_reason(&self) -> Option<&BlockReason> {
        self.mask.as_ref().map(|mask| &mask.reason)
    }
}

/// Outcome counts of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub blocked: usize,
    pub pending: usize,
}

impl SweepReport {
    fn tally(&mut self, outcome: &Classification) {
        self.examined += 1;
        match outcome {
            Classification::Pending => self.pending += 1,
            o if o.is_blocked() => self.blocked += 1,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Invalidation {
    Nothing,
    Panels,
    Classification,
}

// =============================================================================
// Engine
// =============================================================================

pub struct Engine<S: SettingsStore> {
    store: S,
    changes: Receiver<SettingsChange>,
    settings: Settings,
    config: FilterConfig,
    posts: HashMap<PostId, PostRecord>,
    next_id: u64,
}

impl<S: SettingsStore> Engine<S> {
    /// Subscribe to `store` and load the current settings. A failed load
    /// starts from defaults; the next change notification fills them in.
    pub fn new(mut store: S) -> Self {
        let changes = store.subscribe();
        let settings = match store.get_all() {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        };
        let config = FilterConfig::from_settings(&settings);

        log::debug!(
            "engine started: {} flags, mode {}, {} blocked users",
            config.selected_flags.len(),
            config.handling_mode.as_str(),
            settings.blocked_users.len()
        );

        Self {
            store,
            changes,
            settings,
            config,
            posts: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Number of post records currently held.
    pub fn tracked_posts(&self) -> usize {
        self.posts.len()
    }

    pub fn record<D: Dom + ?Sized>(&self, dom: &D, post: &D::Node) -> Option<&PostRecord> {
        read_post_id(dom, post).and_then(|id| self.posts.get(&id))
    }

    pub fn state_of<D: Dom + ?Sized>(&self, dom: &D, post: &D::Node) -> ProcessingState {
        self.record(dom, post).map(|r| r.state).unwrap_or_default()
    }

    // =========================================================================
    // Sweeps
    // =========================================================================

    /// Classify every post in the tree and drop records of posts that are gone.
    pub fn full_sweep<D: Dom + ?Sized>(&mut self, dom: &mut D) -> SweepReport {
        let root = dom.root();
        let posts = dom::find_all(dom, &root, selectors::POST);
        let mut live = Vec::with_capacity(posts.len());
        let mut report = SweepReport::default();

        for post in &posts {
            let id = self.post_id(dom, post);
            live.push(id);
            if let Some(record) = self.posts.get_mut(&id) {
                record.state = ProcessingState::Unset;
            }
            let outcome = self.process_article(dom, post);
            report.tally(&outcome);
        }

        let before = self.posts.len();
        self.posts.retain(|id, _| live.contains(id));
        log::debug!(
            "full sweep: {} posts, {} blocked, {} pending, {} records pruned",
            report.examined,
            report.blocked,
            report.pending,
            before - self.posts.len()
        );
        report
    }

    /// Invalidate every settled classification and sweep again.
    pub fn rerun<D: Dom + ?Sized>(&mut self, dom: &mut D) -> SweepReport {
        for record in self.posts.values_mut() {
            if matches!(record.state, ProcessingState::Checked | ProcessingState::Blocked) {
                record.state = ProcessingState::Unset;
            }
        }
        self.full_sweep(dom)
    }

    /// Reclassify the posts touched by a batch of host mutations.
    pub fn handle_mutations<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
        records: &[MutationRecord<D::Node>],
    ) -> SweepReport {
        let mut queue: Vec<D::Node> = Vec::new();
        let mut removed_posts: Vec<D::Node> = Vec::new();

        for record in records {
            match record.kind {
                MutationKind::ChildList => {
                    for node in &record.removed {
                        collect_removed(dom, node, &mut removed_posts);
                    }
                    for node in &record.added {
                        self.collect_added(dom, node, &mut queue);
                    }
                    if record.added.is_empty() && !record.removed.is_empty() {
                        if record.removed.iter().all(|n| dom.owned_role(n).is_some()) {
                            continue;
                        }
                        self.collect_changed(dom, &record.target, &mut queue);
                    }
                }
                MutationKind::CharacterData => self.collect_changed(dom, &record.target, &mut queue),
            }
        }

        let mut report = SweepReport::default();
        let mut seen: Vec<D::Node> = Vec::with_capacity(queue.len());

        for post in queue {
            if seen.contains(&post) {
                continue;
            }
            seen.push(post.clone());
            if !dom.is_connected(&post) {
                continue;
            }

            let id = self.post_id(dom, &post);
            if let Some(record) = self.posts.get_mut(&id) {
                record.state = ProcessingState::Unset;
                record.handle = None;
            }
            let outcome = self.process_article(dom, &post);
            report.tally(&outcome);
        }

        // A removed post that is still detached after the batch is gone for
        // good; one that was moved is connected again and keeps its record.
        let before = self.posts.len();
        for post in removed_posts {
            if dom.is_connected(&post) {
                continue;
            }
            if let Some(id) = read_post_id(dom, &post) {
                self.posts.remove(&id);
            }
        }
        let pruned = before - self.posts.len();

        if report.examined > 0 || pruned > 0 {
            log::trace!(
                "{} mutation records: {} posts reclassified, {} blocked, {} records dropped",
                records.len(),
                report.examined,
                report.blocked,
                pruned
            );
        }
        report
    }

    /// An added node: posts inside it are queued; otherwise it counts as a
    /// change inside its enclosing post.
    fn collect_added<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node, queue: &mut Vec<D::Node>) {
        if !dom.is_element(node) {
            self.collect_changed(dom, node, queue);
            return;
        }
        if dom::is_within_owned(dom, node) {
            return;
        }

        let is_post = dom::matches_any(dom, node, selectors::POST);
        let nested = dom::find_all(dom, node, selectors::POST);
        if is_post {
            queue.push(node.clone());
        }
        if is_post || !nested.is_empty() {
            queue.extend(nested);
            return;
        }

        self.collect_changed(dom, node, queue);
    }

    /// A change inside a post queues that post, unless it is mid-processing
    /// or already masked with its marker intact.
    fn collect_changed<D: Dom + ?Sized>(&self, dom: &D, node: &D::Node, queue: &mut Vec<D::Node>) {
        if dom::is_within_owned(dom, node) {
            return;
        }
        let Some(post) = dom::closest(dom, node, selectors::POST) else {
            return;
        };

        if let Some(record) = self.record(dom, &post) {
            match record.state {
                ProcessingState::Processing => return,
                ProcessingState::Blocked if dom.attribute(&post, BLOCKED_ATTR).is_some() => return,
                _ => {}
            }
        }
        queue.push(post);
    }

    // =========================================================================
    // Classification
    // =========================================================================

    /// Classify one post. Guarded posts (`Processing`, `Blocked`) are skipped;
    /// callers reset the state first when they want a reclassification.
    pub fn process_article<D: Dom + ?Sized>(&mut self, dom: &mut D, post: &D::Node) -> Classification {
        let id = self.post_id(dom, post);
        let mut record = self.posts.remove(&id).unwrap_or_default();

        let outcome = if record.state.is_guarded() {
            Classification::Skipped
        } else {
            self.classify(dom, post, &mut record)
        };

        self.posts.insert(id, record);
        outcome
    }

    fn classify<D: Dom + ?Sized>(
        &mut self,
        dom: &mut D,
        post: &D::Node,
        record: &mut PostRecord,
    ) -> Classification {
        record.state = ProcessingState::Processing;

        if record.mask.is_some() && dom.attribute(post, BLOCKED_ATTR).is_none() {
            log::debug!("post lost its blocked marker, classifying as new content");
            transform::discard_mask(dom, post, record);
            record.handle = None;
            record.matched_flags.clear();
        }

        let handle = Self::handle_for(dom, post, record);
        if !handle.is_empty() {
            transform::ensure_trigger(dom, post);
        }

        let outcome = if !handle.is_empty() && self.settings.is_blocked(&handle) {
            transform::apply_mask(dom, post, record, &BlockReason::User);
            record.matched_flags.clear();
            record.state = ProcessingState::Blocked;
            log::trace!("@{} is manually blocked", handle);
            Classification::UserBlocked
        } else if self.config.selected_flags.is_empty() {
            self.allow(dom, post, record)
        } else {
            let names = match record.mask.as_ref().and_then(|mask| mask.name.as_ref()) {
                Some(saved) => names::extract_from_snapshot(dom, saved),
                None => names::extract_names(dom, post),
            };

            if names.is_empty() {
                record.state = ProcessingState::Unset;
                Classification::Pending
            } else {
                let matched: Vec<String> = matcher::match_flags(names.iter(), &self.config.selected_flags)
                    .into_iter()
                    .collect();

                if matched.is_empty() {
                    self.allow(dom, post, record)
                } else {
                    let reason = BlockReason::Flags(matched.clone());
                    if transform::apply_mask(dom, post, record, &reason) {
                        self.record_flag_block(&handle, &matched);
                    }
                    log::trace!("post by @{} matched {:?}", handle, matched);
                    record.matched_flags = matched.clone();
                    record.state = ProcessingState::Blocked;
                    Classification::Flagged(matched)
                }
            }
        };

        transform::apply_presentation(dom, post, record, self.config.handling_mode);
        if record.exposed {
            let model = self.panel_model(&handle);
            transform::refresh_panel(dom, post, record, model);
        }

        outcome
    }

    fn allow<D: Dom + ?Sized>(&mut self, dom: &mut D, post: &D::Node, record: &mut PostRecord) -> Classification {
        transform::clear_mask(dom, post, record);
        record.matched_flags.clear();
        record.state = ProcessingState::Checked;
        Classification::Allowed
    }

    /// Memoized handle of `post`. A masked post resolves from its saved name
    /// region, since the live one holds the engine's label.
    fn handle_for<D: Dom + ?Sized>(dom: &mut D, post: &D::Node, record: &mut PostRecord) -> String {
        if let Some(handle) = &record.handle {
            return handle.clone();
        }

        let saved = record.mask.as_ref().and_then(|mask| mask.name.as_ref());
        let handle = match saved {
            Some(saved) => {
                let copy = snapshot::detached_copy(dom, "div", &[("data-testid", "User-Name")], saved);
                handle::resolve_with_region(dom, Some(&copy), post)
            }
            None => handle::resolve_handle(dom, post),
        };

        if !handle.is_empty() {
            record.handle = Some(handle.clone());
        }
        handle
    }

    fn panel_model(&self, handle: &str) -> PanelModel {
        PanelModel::new(handle, self.settings.user_stats.get(handle), self.settings.is_blocked(handle))
    }

    fn post_id<D: Dom + ?Sized>(&mut self, dom: &mut D, post: &D::Node) -> PostId {
        if let Some(id) = read_post_id(dom, post) {
            self.next_id = self.next_id.max(id.0);
            return id;
        }
        self.next_id += 1;
        let id = PostId(self.next_id);
        dom.set_attribute(post, POST_ID_ATTR, &id.0.to_string());
        id
    }

    // =========================================================================
    // Stats
    // =========================================================================

    fn record_flag_block(&mut self, handle: &str, flags: &[String]) {
        self.persist(
            &[SettingKey::FlagBlockCounts],
            |store| stats::increment_flag_counts(store, flags),
            |settings| stats::apply_flag_counts(settings, flags),
        );
        if !handle.is_empty() {
            self.persist(
                &[SettingKey::UserStats],
                |store| stats::record_match(store, handle, flags),
                |settings| stats::apply_match(settings, handle, flags),
            );
        }
    }

    /// Write through the store and adopt the written keys. A failed write is
    /// not an error: the change is applied to the local copy only.
    fn persist<W, A>(&mut self, keys: &[SettingKey], write: W, apply: A)
    where
        W: FnOnce(&mut S) -> Result<Settings, StoreError>,
        A: FnOnce(&mut Settings),
    {
        match write(&mut self.store) {
            Ok(fresh) => {
                for key in keys {
                    adopt(&mut self.settings, &fresh, *key);
                }
            }
            Err(e) => {
                log::debug!("settings write dropped: {}", e);
                apply(&mut self.settings);
            }
        }
        self.config = FilterConfig::from_settings(&self.settings);
    }

    // =========================================================================
    // Settings changes
    // =========================================================================

    /// Drain pending store notifications. Returns true if they caused a rerun.
    pub fn pump_settings<D: Dom + ?Sized>(&mut self, dom: &mut D) -> bool {
        let changes: Vec<SettingsChange> = self.changes.try_iter().collect();
        let effect = changes
            .iter()
            .map(|change| self.absorb_change(change))
            .max()
            .unwrap_or(Invalidation::Nothing);
        self.settle(dom, effect)
    }

    /// Apply one change delivered outside the subscription.
    pub fn apply_settings_change<D: Dom + ?Sized>(&mut self, dom: &mut D, change: &SettingsChange) -> bool {
        let effect = self.absorb_change(change);
        self.settle(dom, effect)
    }

    fn absorb_change(&mut self, change: &SettingsChange) -> Invalidation {
        let config_before = self.config.clone();
        let blocked_before = self.settings.blocked_users.clone();

        let Some(key) = self.settings.apply_change(change) else {
            return Invalidation::Nothing;
        };
        self.config = FilterConfig::from_settings(&self.settings);

        if key.invalidates_classification() {
            if self.config != config_before || self.settings.blocked_users != blocked_before {
                log::debug!("'{}' changed, reclassifying", key.as_str());
                return Invalidation::Classification;
            }
            return Invalidation::Nothing;
        }

        match key {
            SettingKey::UserStats => Invalidation::Panels,
            _ => Invalidation::Nothing,
        }
    }

    fn settle<D: Dom + ?Sized>(&mut self, dom: &mut D, effect: Invalidation) -> bool {
        match effect {
            Invalidation::Classification => {
                self.rerun(dom);
                true
            }
            Invalidation::Panels => {
                self.refresh_exposed_panels(dom);
                false
            }
            Invalidation::Nothing => false,
        }
    }

    fn refresh_exposed_panels<D: Dom + ?Sized>(&mut self, dom: &mut D) {
        let root = dom.root();
        for post in dom::find_all(dom, &root, selectors::POST) {
            let Some(id) = read_post_id(dom, &post) else {
                continue;
            };
            let Some(mut record) = self.posts.remove(&id) else {
                continue;
            };
            if record.exposed {
                let handle = Self::handle_for(dom, &post, &mut record);
                let model = self.panel_model(&handle);
                transform::refresh_panel(dom, &post, &mut record, model);
            }
            self.posts.insert(id, record);
        }
    }

    // =========================================================================
    // Controls
    // =========================================================================

    /// Run an action from an injected control on `post`. Returns false when
    /// the action needs a handle and none could be resolved.
    pub fn handle_control<D: Dom + ?Sized>(&mut self, dom: &mut D, post: &D::Node, action: ControlAction) -> bool {
        let id = self.post_id(dom, post);
        let mut record = self.posts.remove(&id).unwrap_or_default();
        let handle = Self::handle_for(dom, post, &mut record);

        if action == ControlAction::TogglePanel {
            let model = self.panel_model(&handle);
            let exposed = transform::toggle_expand(dom, post, &mut record, model);
            log::trace!("panel for @{} {}", handle, if exposed { "opened" } else { "closed" });
            self.posts.insert(id, record);
            return true;
        }

        self.posts.insert(id, record);
        if handle.is_empty() {
            return false;
        }

        match action {
            ControlAction::BlockUser => {
                self.persist(
                    &[SettingKey::BlockedUsers, SettingKey::UserStats],
                    |store| stats::block_user(store, &handle),
                    |settings| {
                        stats::apply_block_user(settings, &handle);
                    },
                );
                self.rerun(dom);
            }
            ControlAction::UnblockUser => {
                self.persist(
                    &[SettingKey::BlockedUsers],
                    |store| stats::unblock_user(store, &handle),
                    |settings| {
                        stats::apply_unblock_user(settings, &handle);
                    },
                );
                self.rerun(dom);
            }
            ControlAction::SetNote(note) => {
                self.persist(
                    &[SettingKey::UserStats],
                    |store| stats::set_note(store, &handle, &note),
                    |settings| stats::apply_note(settings, &handle, &note),
                );
                self.refresh_exposed_panels(dom);
            }
            ControlAction::SetNickname(nickname) => {
                self.persist(
                    &[SettingKey::UserStats],
                    |store| stats::set_nickname(store, &handle, &nickname),
                    |settings| stats::apply_nickname(settings, &handle, &nickname),
                );
                self.refresh_exposed_panels(dom);
            }
            ControlAction::TogglePanel => {}
        }
        true
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Restore every post, remove all injected UI, and hand the store back.
    /// Dropping the engine's receiver ends its subscription.
    pub fn teardown<D: Dom + ?Sized>(mut self, dom: &mut D) -> S {
        let root = dom.root();
        for post in dom::find_all(dom, &root, selectors::POST) {
            if let Some(mut record) = read_post_id(dom, &post).and_then(|id| self.posts.remove(&id)) {
                transform::clear_mask(dom, &post, &mut record);
                transform::close_panel(dom, &post, &mut record);
            }
            for (node, _) in dom::owned_nodes(dom, &post) {
                dom::detach(dom, &node);
            }
            dom.remove_attribute(&post, POST_ID_ATTR);
        }
        log::debug!("engine torn down");
        self.store
    }
}

/// Posts at or under a removed node.
fn collect_removed<D: Dom + ?Sized>(dom: &D, node: &D::Node, posts: &mut Vec<D::Node>) {
    if !dom.is_element(node) || dom.owned_role(node).is_some() {
        return;
    }
    if dom::matches_any(dom, node, selectors::POST) {
        posts.push(node.clone());
    }
    posts.extend(dom::find_all(dom, node, selectors::POST));
}

fn read_post_id<D: Dom + ?Sized>(dom: &D, post: &D::Node) -> Option<PostId> {
    dom.attribute(post, POST_ID_ATTR)?.parse().ok().map(PostId)
}

fn adopt(settings: &mut Settings, fresh: &Settings, key: SettingKey) {
    match key {
        SettingKey::SelectedFlags => settings.selected_flags = fresh.selected_flags.clone(),
        SettingKey::HandlingMode => settings.handling_mode = fresh.handling_mode,
        SettingKey::FlagBlockCounts => settings.flag_block_counts = fresh.flag_block_counts.clone(),
        SettingKey::BlockedUsers => settings.blocked_users = fresh.blocked_users.clone(),
        SettingKey::UserStats => settings.user_stats = fresh.user_stats.clone(),
    }
}
