//! Message selection: which raw messages a recap covers, and in what order.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::{
    domain::{ChannelId, Ts},
    messaging::{port::ChatPort, types::Message},
    Result,
};

/// Hard cap on messages fed into one summary.
pub const DEFAULT_MAX_MESSAGES: usize = 150;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionLimits {
    pub max_messages: usize,
    /// History page size for slash commands and mentions.
    pub command_history_limit: usize,
    /// History page size for the scheduled digest.
    pub sweep_history_limit: usize,
    /// Window used when a command carries no `<N>d` token.
    pub default_window_days: u32,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            command_history_limit: 200,
            sweep_history_limit: 100,
            default_window_days: 1,
        }
    }
}

/// How a trigger picks its messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionMode {
    /// Every entry of one thread, minus the invoking mention when `exclude`
    /// names it.
    Thread { thread_ts: Ts, exclude: Option<Ts> },
    /// Top-level history newer than `now - window`, threads expanded inline.
    /// `exclude` drops the invoking mention from the roots.
    Window {
        window: Duration,
        limit: usize,
        exclude: Option<Ts>,
    },
}

/// An ordered, capped selection ready for the transcript builder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionResult {
    pub messages: Vec<Message>,
    pub truncated: bool,
}

impl SelectionResult {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Oldest timestamp inside a window ending at `now`.
pub fn window_start(now: DateTime<Utc>, window: Duration) -> Ts {
    Ts::from_datetime(now - window)
}

pub async fn select_messages(
    chat: &dyn ChatPort,
    channel: &ChannelId,
    mode: &SelectionMode,
    max_messages: usize,
    now: DateTime<Utc>,
) -> Result<SelectionResult> {
    let messages = match mode {
        SelectionMode::Thread { thread_ts, exclude } => {
            let entries = chat.replies(channel, thread_ts).await?;
            structure_thread(entries, exclude.as_ref())
        }
        SelectionMode::Window {
            window,
            limit,
            exclude,
        } => {
            let oldest = window_start(now, *window);
            let history = chat.history(channel, Some(&oldest), *limit).await?;
            let mut roots = top_level_roots(history);
            if let Some(ts) = exclude {
                roots.retain(|m| &m.ts != ts);
            }
            debug!(channel = %channel, roots = roots.len(), "selected top-level messages");
            enrich_with_replies(chat, channel, roots, max_messages).await?
        }
    };

    Ok(cap_messages(messages, max_messages))
}

/// Root first and unflagged, everything after it flagged as a reply.
pub fn structure_thread(entries: Vec<Message>, exclude: Option<&Ts>) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut thread: Vec<Message> = entries
        .into_iter()
        .filter(Message::is_qualifying)
        .filter(|m| Some(&m.ts) != exclude)
        .filter(|m| seen.insert(m.ts.clone()))
        .collect();

    for (idx, m) in thread.iter_mut().enumerate() {
        m.is_reply = idx > 0;
    }
    thread
}

/// Qualifying top-level messages, oldest first, unique by timestamp.
pub fn top_level_roots(history: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut roots: Vec<Message> = history
        .into_iter()
        .filter(|m| m.is_qualifying() && m.is_top_level())
        .filter(|m| seen.insert(m.ts.clone()))
        .map(|mut m| {
            m.is_reply = false;
            m
        })
        .collect();
    roots.sort_by(|a, b| a.ts.cmp(&b.ts));
    roots
}

/// Follow each root that has replies and cluster them right after it.
///
/// Stops fetching once the selection already exceeds `max_messages`; the
/// tail would be cut anyway.
async fn enrich_with_replies(
    chat: &dyn ChatPort,
    channel: &ChannelId,
    roots: Vec<Message>,
    max_messages: usize,
) -> Result<Vec<Message>> {
    let mut seen: HashSet<Ts> = roots.iter().map(|m| m.ts.clone()).collect();
    let mut enriched = Vec::with_capacity(roots.len());

    for root in roots {
        let expand = root.has_replies() && enriched.len() < max_messages;
        let root_ts = root.ts.clone();
        enriched.push(root);
        if !expand {
            continue;
        }

        let thread = chat.replies(channel, &root_ts).await?;
        enriched.extend(thread_replies(&root_ts, thread, &mut seen));
    }

    Ok(enriched)
}

fn thread_replies(
    root_ts: &Ts,
    thread: Vec<Message>,
    seen: &mut HashSet<Ts>,
) -> Vec<Message> {
    thread
        .into_iter()
        .filter(|m| &m.ts != root_ts && m.is_qualifying())
        .filter(|m| seen.insert(m.ts.clone()))
        .map(|mut m| {
            m.is_reply = true;
            m
        })
        .collect()
}

/// Keep the first `cap` entries in order and flag whether anything was cut.
pub fn cap_messages(mut messages: Vec<Message>, cap: usize) -> SelectionResult {
    let truncated = messages.len() > cap;
    messages.truncate(cap);
    SelectionResult {
        messages,
        truncated,
    }
}
