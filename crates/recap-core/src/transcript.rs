//! Deterministic, annotated transcript of a selection.

use crate::{
    formatting::{date_token, mention_token},
    identity::IdentityMap,
    messaging::types::Message,
};

/// Leading marker of a thread reply line.
pub const REPLY_INDENT: &str = "  ↳ ";

#[derive(Clone, Copy, Debug, Default)]
pub struct TranscriptOptions {
    /// Prefix each line with a Slack date token.
    pub timestamps: bool,
}

/// One line per message:
/// `{indent}{date token }<@ID> (Name): body`.
pub fn build_transcript(
    messages: &[Message],
    identities: &IdentityMap,
    opts: TranscriptOptions,
) -> String {
    messages
        .iter()
        .map(|m| transcript_line(m, identities, opts))
        .collect::<Vec<_>>()
        .join("\n")
}

fn transcript_line(m: &Message, identities: &IdentityMap, opts: TranscriptOptions) -> String {
    let mut line = String::new();
    if m.is_reply {
        line.push_str(REPLY_INDENT);
    }

    if opts.timestamps {
        if let Some(token) = date_token(&m.ts) {
            line.push_str(&token);
            line.push(' ');
        }
    }

    if let Some(user) = &m.user {
        line.push_str(&mention_token(user));
        line.push_str(&format!(" ({})", identities.name_for(user)));
    }
    line.push_str(": ");
    line.push_str(&single_line(m.text.as_deref().unwrap_or_default()));
    line
}

// Multi-line bodies would break the one-message-per-line layout.
fn single_line(body: &str) -> String {
    body.lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
