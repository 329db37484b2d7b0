//! Core type definitions for FlagFilter
//!
//! These types describe per-post engine state and the engine-owned UI that
//! the transformation engine injects into the host page.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Handling Mode
// =============================================================================

/// What to do with a post once it is classified as blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum HandlingMode {
    /// Mask the post and collapse its timeline cell.
    #[default]
    Hide,
    /// Mask the post but leave the placeholder visible with its controls.
    Block,
}

impl HandlingMode {
    /// Parse from the stored string. Anything unrecognized is `Hide`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "block" => Self::Block,
            _ => Self::Hide,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hide => "hide",
            Self::Block => "block",
        }
    }
}

// =============================================================================
// Processing State
// =============================================================================

/// Classification progress of a single post element.
///
/// Transitions `Unset -> Processing -> {Checked | Blocked}`. Host mutations
/// and settings changes reset it to `Unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProcessingState {
    #[default]
    Unset,
    Processing,
    Checked,
    Blocked,
}

impl ProcessingState {
    /// A post in this state must not be picked up by a mutation callback.
    #[inline]
    pub fn is_guarded(&self) -> bool {
        matches!(self, Self::Processing | Self::Blocked)
    }
}

/// Engine-assigned identity of a post element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(pub u64);

// =============================================================================
// Engine-owned UI
// =============================================================================

/// Role of a node the engine injected into the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnedRole {
    /// Info-panel trigger inside the author name region
    Trigger,
    /// Reveal toggle attached to a masked post
    Toggle,
    /// Inline info panel with stats and controls
    Panel,
    /// "Blocked By ..." label replacing the author name
    Label,
    /// Flag badge replacing the avatar
    Badge,
    /// Zero-width placeholder keeping the blanked body slot alive
    Placeholder,
}

impl OwnedRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Toggle => "toggle",
            Self::Panel => "panel",
            Self::Label => "label",
            Self::Badge => "badge",
            Self::Placeholder => "placeholder",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "trigger" => Some(Self::Trigger),
            "toggle" => Some(Self::Toggle),
            "panel" => Some(Self::Panel),
            "label" => Some(Self::Label),
            "badge" => Some(Self::Badge),
            "placeholder" => Some(Self::Placeholder),
            _ => None,
        }
    }

    /// Controls outlive a mask; everything else is a mask artifact and is
    /// dropped when the mask is cleared.
    #[inline]
    pub fn is_control(self) -> bool {
        matches!(self, Self::Trigger | Self::Toggle | Self::Panel)
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Why a post is masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Author name carries one or more selected flags
    Flags(Vec<String>),
    /// Author handle is in the blocked-user list
    User,
}

impl BlockReason {
    /// Value written to the post's blocked marker attribute.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Flags(_) => "flags",
            Self::User => "user",
        }
    }
}

/// Outcome of one `process_article` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Post was guarded (`Processing` or `Blocked`) and left untouched.
    Skipped,
    /// Names not rendered yet; left `Unset` for a later mutation.
    Pending,
    /// No match; post shown in its original form.
    Allowed,
    /// Masked because the author name carries these flags.
    Flagged(Vec<String>),
    /// Masked because the author is manually blocked.
    UserBlocked,
}

impl Classification {
    #[inline]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Flagged(_) | Self::UserBlocked)
    }
}

// =============================================================================
// Controls
// =============================================================================

/// A user action dispatched from an injected control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    TogglePanel,
    BlockUser,
    UnblockUser,
    SetNote(String),
    SetNickname(String),
}

impl ControlAction {
    /// Build from a control's `data-ff-action` value. `input` carries the
    /// text of the field paired with save controls.
    pub fn from_attr(action: &str, input: Option<String>) -> Option<Self> {
        match action {
            "toggle-panel" => Some(Self::TogglePanel),
            "block" => Some(Self::BlockUser),
            "unblock" => Some(Self::UnblockUser),
            "save-note" => Some(Self::SetNote(input.unwrap_or_default())),
            "save-nickname" => Some(Self::SetNickname(input.unwrap_or_default())),
            _ => None,
        }
    }
}
