use std::{cmp::Ordering, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slack user id (`U…` / `W…`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Slack conversation id (`C…`, `G…`, `D…`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

/// Slack message timestamp (`"1700000000.000100"`).
///
/// Doubles as the message key within a channel. Ordering compares the numeric
/// value, so `"999.9"` sorts before `"1000.0"`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ts(pub String);

impl Ts {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(format!("{}.{:06}", dt.timestamp(), dt.timestamp_subsec_micros()))
    }

    /// Whole seconds since the epoch, if the timestamp is well formed.
    pub fn seconds(&self) -> Option<i64> {
        let secs = self.0.split('.').next()?;
        secs.trim().parse::<i64>().ok()
    }

    fn sort_key(&self) -> (u64, u32) {
        let (secs, frac) = self.0.split_once('.').unwrap_or((self.0.as_str(), ""));
        let secs = secs.trim().parse::<u64>().unwrap_or(0);
        let mut micros: String = frac.chars().take(6).collect();
        while micros.len() < 6 {
            micros.push('0');
        }
        (secs, micros.parse::<u32>().unwrap_or(0))
    }
}

impl Ord for Ts {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Ts {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ts_orders_numerically() {
        let mut v = vec![
            Ts::new("1000.000001"),
            Ts::new("999.900000"),
            Ts::new("1000.5"),
            Ts::new("1000.000010"),
        ];
        v.sort();
        let got: Vec<&str> = v.iter().map(|t| t.as_str()).collect();
        assert_eq!(got, vec!["999.900000", "1000.000001", "1000.000010", "1000.5"]);
    }

    #[test]
    fn ts_from_datetime_keeps_micros() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::microseconds(42);
        let ts = Ts::from_datetime(dt);
        assert_eq!(ts.as_str(), format!("{}.000042", dt.timestamp()));
        assert_eq!(ts.seconds(), Some(dt.timestamp()));
    }
}
