//! Inbound trigger shapes, normalized into one invocation before selection.

use std::sync::OnceLock;

use chrono::Duration;
use regex::Regex;

use crate::{
    domain::{ChannelId, Ts, UserId},
    selection::{SelectionLimits, SelectionMode},
};

/// Everything that can start a recap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// `/recap [#channel…] [Nd]`
    Command {
        user: UserId,
        channel: ChannelId,
        channel_name: Option<String>,
        text: String,
        response_url: String,
    },
    /// `@bot recap` in a channel or thread.
    Mention {
        user: UserId,
        channel: ChannelId,
        ts: Ts,
        thread_ts: Option<Ts>,
        text: String,
    },
    /// Message shortcut on a specific message.
    Shortcut {
        user: UserId,
        channel: ChannelId,
        message_ts: Ts,
        thread_ts: Option<Ts>,
        response_url: String,
    },
    /// Scheduled digest over a fixed channel list.
    Sweep {
        channels: Vec<ChannelId>,
        destination: ChannelId,
    },
}

/// One channel to summarize. `title` is resolved later when unknown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub channel: ChannelId,
    pub title: Option<String>,
}

/// Where the finished summary (or the failure notice) goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplyTarget {
    /// Ephemeral reply through an interaction response URL.
    ResponseUrl(String),
    /// Direct message to the requester; failures go ephemeral in `origin`.
    DirectMessage { user: UserId, origin: ChannelId },
    /// Digest channel of a scheduled sweep.
    Digest { destination: ChannelId },
}

/// A trigger in its common shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub requester: Option<UserId>,
    pub targets: Vec<Target>,
    pub mode: SelectionMode,
    pub reply: ReplyTarget,
}

pub const THREAD_TITLE: &str = "thread";

impl Trigger {
    /// Normalize into an invocation. Mentions without `keyword` yield `None`.
    pub fn normalize(self, limits: &SelectionLimits, keyword: &str) -> Option<Invocation> {
        match self {
            Trigger::Command {
                user,
                channel,
                channel_name,
                text,
                response_url,
            } => {
                let refs = parse_channel_refs(&text);
                let targets = if refs.is_empty() {
                    vec![Target {
                        title: channel_name
                            .filter(|n| !n.trim().is_empty())
                            .map(|n| format!("#{n}")),
                        channel,
                    }]
                } else {
                    refs.into_iter()
                        .map(|(channel, name)| Target {
                            channel,
                            title: name.map(|n| format!("#{n}")),
                        })
                        .collect()
                };
                Some(Invocation {
                    requester: Some(user),
                    targets,
                    mode: window_mode(&text, limits, None),
                    reply: ReplyTarget::ResponseUrl(response_url),
                })
            }
            Trigger::Mention {
                user,
                channel,
                ts,
                thread_ts,
                text,
            } => {
                if !mentions_keyword(&text, keyword) {
                    return None;
                }
                let (title, mode) = match thread_ts {
                    Some(thread_ts) => (
                        Some(THREAD_TITLE.to_string()),
                        SelectionMode::Thread {
                            thread_ts,
                            exclude: Some(ts),
                        },
                    ),
                    None => (None, window_mode(&text, limits, Some(ts))),
                };
                Some(Invocation {
                    requester: Some(user.clone()),
                    targets: vec![Target {
                        channel: channel.clone(),
                        title,
                    }],
                    mode,
                    reply: ReplyTarget::DirectMessage {
                        user,
                        origin: channel,
                    },
                })
            }
            Trigger::Shortcut {
                user,
                channel,
                message_ts,
                thread_ts,
                response_url,
            } => Some(Invocation {
                requester: Some(user),
                targets: vec![Target {
                    channel,
                    title: Some(THREAD_TITLE.to_string()),
                }],
                mode: SelectionMode::Thread {
                    thread_ts: thread_ts.unwrap_or(message_ts),
                    exclude: None,
                },
                reply: ReplyTarget::ResponseUrl(response_url),
            }),
            Trigger::Sweep {
                channels,
                destination,
            } => Some(Invocation {
                requester: None,
                targets: channels
                    .into_iter()
                    .map(|channel| Target {
                        channel,
                        title: None,
                    })
                    .collect(),
                mode: SelectionMode::Window {
                    window: Duration::hours(24),
                    limit: limits.sweep_history_limit,
                    exclude: None,
                },
                reply: ReplyTarget::Digest { destination },
            }),
        }
    }
}

fn window_mode(text: &str, limits: &SelectionLimits, exclude: Option<Ts>) -> SelectionMode {
    let days = parse_window_days(text).unwrap_or(limits.default_window_days.max(1));
    SelectionMode::Window {
        window: Duration::days(i64::from(days)),
        limit: limits.command_history_limit,
        exclude,
    }
}

fn mentions_keyword(text: &str, keyword: &str) -> bool {
    let keyword = keyword.trim().to_lowercase();
    keyword.is_empty() || text.to_lowercase().contains(&keyword)
}

fn channel_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<#([CG][A-Z0-9]+)(?:\|([^>]*))?>").expect("valid regex"))
}

fn window_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|\s)(\d{1,4})d\s*$").expect("valid regex"))
}

/// `<#C123|general>` references in command text, in order, deduplicated.
pub fn parse_channel_refs(text: &str) -> Vec<(ChannelId, Option<String>)> {
    let mut out: Vec<(ChannelId, Option<String>)> = Vec::new();
    for cap in channel_ref_re().captures_iter(text) {
        let id = ChannelId(cap[1].to_string());
        if out.iter().any(|(seen, _)| seen == &id) {
            continue;
        }
        let name = cap
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|n| !n.is_empty());
        out.push((id, name));
    }
    out
}

/// Trailing `<N>d` window override. `0d` counts as absent.
pub fn parse_window_days(text: &str) -> Option<u32> {
    let cap = window_re().captures(text)?;
    cap[1].parse::<u32>().ok().filter(|d| *d > 0)
}
