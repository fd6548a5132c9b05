//! Slack mrkdwn tokens and small text helpers.

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::domain::{Ts, UserId};

/// Platform mention token, rendered by clients as a clickable name.
pub fn mention_token(user: &UserId) -> String {
    format!("<@{}>", user.0)
}

/// Slack date token for a message timestamp, shown in each reader's local time.
///
/// Returns `None` when the timestamp has no usable seconds part.
pub fn date_token(ts: &Ts) -> Option<String> {
    let secs = ts.seconds()?;
    let fallback = Utc.timestamp_opt(secs, 0).single()?;
    Some(format!(
        "<!date^{secs}^{{date_short_pretty}} at {{time}}|{}>",
        fallback.format("%Y-%m-%d %H:%M UTC")
    ))
}

/// Human-readable "generated at" stamp for summary footers.
pub fn format_generated_at(at: DateTime<Local>) -> String {
    at.format("%b %-d, %Y %-I:%M %p").to_string()
}

/// Truncate to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(1);
    let mut out: String = text.chars().take(keep).collect();
    out.push('…');
    out
}
