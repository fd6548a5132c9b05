use serde::{Deserialize, Serialize};

use crate::domain::{Ts, UserId};

/// One chat entry as returned by the history / replies APIs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub ts: Ts,
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<Ts>,
    #[serde(default)]
    pub reply_count: Option<u32>,
    /// Set for joins, bot posts, broadcasts, `/me` posts and edits.
    #[serde(default)]
    pub subtype: Option<String>,
    /// Non-root thread member. Set by the selector, never by the platform.
    #[serde(skip)]
    pub is_reply: bool,
}

/// Subtypes that carry no conversation: membership changes, channel
/// housekeeping, bot traffic and edit/delete notifications.
const IGNORED_SUBTYPES: &[&str] = &[
    "bot_add",
    "bot_message",
    "bot_remove",
    "channel_archive",
    "channel_join",
    "channel_leave",
    "channel_name",
    "channel_purpose",
    "channel_topic",
    "channel_unarchive",
    "group_join",
    "group_leave",
    "message_changed",
    "message_deleted",
    "pinned_item",
    "tombstone",
    "unpinned_item",
];

impl Message {
    /// A top-level entry: not in a thread, or the root of its own thread.
    pub fn is_top_level(&self) -> bool {
        match &self.thread_ts {
            None => true,
            Some(parent) => parent == &self.ts,
        }
    }

    /// Authored by a user, carries text and is not a system entry.
    pub fn is_qualifying(&self) -> bool {
        let system = self
            .subtype
            .as_deref()
            .is_some_and(|s| IGNORED_SUBTYPES.contains(&s));
        !system
            && self.user.is_some()
            && self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn has_replies(&self) -> bool {
        self.reply_count.unwrap_or(0) > 0
    }
}

/// The subset of a user profile the identity resolver looks at.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub name: Option<String>,
    pub display_name_normalized: Option<String>,
    pub real_name_normalized: Option<String>,
}

/// A Block Kit layout block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { text: TextObject },
    Divider,
    Section { text: TextObject },
    Context { elements: Vec<TextObject> },
}

/// A Block Kit text composition object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::PlainText { text } | Self::Mrkdwn { text } => text,
        }
    }
}

/// A reply only the requester sees (slash command / shortcut response URL).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EphemeralReply {
    pub text: String,
    pub blocks: Vec<Block>,
}

impl EphemeralReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            blocks: Vec::new(),
        }
    }
}
