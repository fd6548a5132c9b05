//! Completion text → Block Kit summary.
//!
//! The transcript shows names in parentheses next to mention tokens, and the
//! model tends to echo them. The cleanup runs in a fixed order: strip
//! parentheticals, substitute names with mention tokens, collapse repeated
//! mentions. Substituting before stripping lets the strip eat tokens; skipping
//! the collapse leaves `<@U1> <@U1>` wherever the model already used the token.

use std::sync::OnceLock;

use chrono::{DateTime, Local};
use regex::{NoExpand, Regex};

use crate::{
    domain::UserId,
    formatting::{format_generated_at, mention_token, truncate_chars},
    identity::IdentityMap,
    messaging::types::{Block, TextObject},
};

pub const BULLET: char = '•';

/// Slack rejects messages carrying more blocks than this.
pub const MAX_BLOCKS: usize = 50;

const HEADER_MAX_CHARS: usize = 150;
const SECTION_MAX_CHARS: usize = 3000;

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\([^)]*\)").expect("valid regex"))
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^<>]*>").expect("valid regex"))
}

fn mention_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<@[^>]+>").expect("valid regex"))
}

/// Step 1: drop every `(...)` span along with the whitespace before it.
pub fn strip_parentheticals(text: &str) -> String {
    parenthetical_re().replace_all(text, "").into_owned()
}

/// Step 2: whole-word display names → mention tokens.
///
/// Text already inside `<…>` is left alone, and longer names go first so
/// "Al Smith" is not consumed by "Al".
pub fn substitute_names(text: &str, identities: &IdentityMap) -> String {
    let mut entries: Vec<(&UserId, &str)> = identities
        .iter()
        .filter(|(_, name)| !name.trim().is_empty())
        .collect();
    entries.sort_by(|a, b| {
        b.1.chars()
            .count()
            .cmp(&a.1.chars().count())
            .then_with(|| a.0.cmp(b.0))
    });

    let mut out = text.to_string();
    for (user, name) in entries {
        let Some(re) = whole_word_re(name) else {
            continue;
        };
        out = replace_outside_tokens(&out, &re, &mention_token(user));
    }
    out
}

fn whole_word_re(name: &str) -> Option<Regex> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let name = name.trim();
    let lead = if name.chars().next().is_some_and(is_word) { r"\b" } else { "" };
    let tail = if name.chars().last().is_some_and(is_word) { r"\b" } else { "" };
    Regex::new(&format!("{lead}{}{tail}", regex::escape(name))).ok()
}

fn replace_outside_tokens(text: &str, re: &Regex, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for tok in token_re().find_iter(text) {
        out.push_str(&re.replace_all(&text[last..tok.start()], NoExpand(replacement)));
        out.push_str(tok.as_str());
        last = tok.end();
    }
    out.push_str(&re.replace_all(&text[last..], NoExpand(replacement)));
    out
}

/// Step 3: `<@U1> <@U1>` → `<@U1>`. Never joins across a line break.
pub fn collapse_repeated_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut prev: Option<&str> = None;

    for m in mention_re().find_iter(text) {
        let gap = &text[last..m.start()];
        let inline_space = gap.chars().all(|c| c.is_whitespace() && c != '\n' && c != '\r');
        if prev == Some(m.as_str()) && inline_space {
            last = m.end();
            continue;
        }
        out.push_str(gap);
        out.push_str(m.as_str());
        prev = Some(m.as_str());
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Step 4: the `•` lines, without their bullet.
pub fn extract_bullets(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| {
            let line = match line.strip_prefix("* ") {
                Some(rest) => rest,
                None => line.strip_prefix(BULLET)?,
            };
            let body = line.trim_start();
            (!body.is_empty()).then(|| body.to_string())
        })
        .collect()
}

/// Steps 1–4 in their only valid order.
pub fn clean_completion(raw: &str, identities: &IdentityMap) -> Vec<String> {
    let stripped = strip_parentheticals(raw.trim());
    let substituted = substitute_names(&stripped, identities);
    let collapsed = collapse_repeated_mentions(&substituted);
    extract_bullets(&collapsed)
}

/// Who the footer credits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attribution {
    Requester(UserId),
    Digest,
}

#[derive(Clone, Debug)]
pub struct SummaryMeta {
    /// `#channel` or `thread`.
    pub title: String,
    pub attribution: Attribution,
    /// Set to the cap when the selection was truncated.
    pub truncated_at: Option<usize>,
    pub generated_at: DateTime<Local>,
}

/// A finished summary, ready to post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedSummary {
    title: String,
    bullets: Vec<String>,
    blocks: Vec<Block>,
}

impl RenderedSummary {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn bullets(&self) -> &[String] {
        &self.bullets
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }

    /// Notification / accessibility text for the posted message.
    pub fn fallback_text(&self) -> String {
        format!("{} summary", self.title)
    }
}

pub fn render_summary(raw: &str, identities: &IdentityMap, meta: &SummaryMeta) -> RenderedSummary {
    let mut bullets = clean_completion(raw, identities);
    bullets.truncate(MAX_BLOCKS - frame_blocks(meta));
    let blocks = assemble_blocks(&bullets, meta);
    RenderedSummary {
        title: meta.title.clone(),
        bullets,
        blocks,
    }
}

/// Blocks around the bullet sections: header, two dividers, footer and the
/// optional truncation note.
fn frame_blocks(meta: &SummaryMeta) -> usize {
    4 + usize::from(meta.truncated_at.is_some())
}

/// Step 5–6: header, divider, one section per bullet, divider, footer, and
/// the truncation note when needed.
fn assemble_blocks(bullets: &[String], meta: &SummaryMeta) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(bullets.len() + 5);
    blocks.push(Block::Header {
        text: TextObject::plain(truncate_chars(
            &format!("📝 {} summary", meta.title),
            HEADER_MAX_CHARS,
        )),
    });
    blocks.push(Block::Divider);
    blocks.extend(bullets.iter().map(|b| Block::Section {
        text: TextObject::mrkdwn(truncate_chars(&format!("{BULLET} {b}"), SECTION_MAX_CHARS)),
    }));
    blocks.push(Block::Divider);

    let when = format_generated_at(meta.generated_at);
    let footer = match &meta.attribution {
        Attribution::Requester(user) => {
            format!("_Summarized for {} {BULLET} {when}_", mention_token(user))
        }
        Attribution::Digest => format!("_Daily digest {BULLET} {when}_"),
    };
    blocks.push(Block::Context {
        elements: vec![TextObject::mrkdwn(footer)],
    });

    if let Some(cap) = meta.truncated_at {
        blocks.push(Block::Context {
            elements: vec![TextObject::mrkdwn(format!(
                "_Only the most recent {cap} messages were summarized._"
            ))],
        });
    }
    blocks
}
