//! User id → display name resolution, scoped to one invocation.

use std::collections::{BTreeSet, HashMap};

use futures_util::future::join_all;
use tracing::warn;

use crate::{
    domain::UserId,
    messaging::{
        port::ChatPort,
        types::{Message, UserProfile},
    },
};

/// Display names for the authors of one selection. Consulted by key only.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentityMap {
    names: HashMap<UserId, String>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, user: UserId, name: impl Into<String>) {
        self.names.insert(user, name.into());
    }

    /// Resolved name, or the raw id when the user is unknown.
    pub fn name_for<'a>(&'a self, user: &'a UserId) -> &'a str {
        self.names
            .get(user)
            .map(String::as_str)
            .unwrap_or(user.0.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &str)> {
        self.names.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(UserId, String)> for IdentityMap {
    fn from_iter<I: IntoIterator<Item = (UserId, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// Best display name from a profile: display > real > account name.
pub fn preferred_name(profile: &UserProfile) -> Option<String> {
    [
        profile.display_name_normalized.as_deref(),
        profile.real_name_normalized.as_deref(),
        profile.name.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|s| !s.is_empty())
    .map(str::to_string)
}

/// Look up every distinct author in `messages` concurrently.
///
/// A failed lookup is logged and falls back to the raw id; it never fails the
/// whole map.
pub async fn resolve_identities(chat: &dyn ChatPort, messages: &[Message]) -> IdentityMap {
    let users: BTreeSet<&UserId> = messages.iter().filter_map(|m| m.user.as_ref()).collect();

    let lookups = users.into_iter().map(|user| async move {
        let name = match chat.user_info(user).await {
            Ok(profile) => preferred_name(&profile).unwrap_or_else(|| user.0.clone()),
            Err(e) => {
                warn!(user = %user, error = %e, "user lookup failed, using raw id");
                user.0.clone()
            }
        };
        (user.clone(), name)
    });

    join_all(lookups).await.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{msg, FakeChat};

    #[test]
    fn name_precedence() {
        let full = UserProfile {
            name: Some("alice.w".into()),
            display_name_normalized: Some("Alice".into()),
            real_name_normalized: Some("Alice Wong".into()),
        };
        assert_eq!(preferred_name(&full).as_deref(), Some("Alice"));

        let no_display = UserProfile {
            display_name_normalized: Some("".into()),
            ..full.clone()
        };
        assert_eq!(preferred_name(&no_display).as_deref(), Some("Alice Wong"));

        let account_only = UserProfile {
            name: Some("alice.w".into()),
            ..Default::default()
        };
        assert_eq!(preferred_name(&account_only).as_deref(), Some("alice.w"));

        assert_eq!(preferred_name(&UserProfile::default()), None);
    }

    #[tokio::test]
    async fn resolves_each_author_once_and_falls_back_on_failure() {
        let chat = FakeChat::default().with_user("U1", "Alice");
        let messages = vec![
            msg("1.0", "U1", "a"),
            msg("2.0", "U2", "b"),
            msg("3.0", "U1", "c"),
        ];

        let map = resolve_identities(&chat, &messages).await;

        assert_eq!(map.len(), 2);
        assert_eq!(map.name_for(&UserId("U1".into())), "Alice");
        assert_eq!(map.name_for(&UserId("U2".into())), "U2");
        assert_eq!(chat.user_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lookups_fall_back_through_real_and_account_names() {
        let chat = FakeChat::default()
            .with_profile(
                "U1",
                UserProfile {
                    name: Some("alice.w".into()),
                    display_name_normalized: Some("  ".into()),
                    real_name_normalized: Some("Alice Wong".into()),
                },
            )
            .with_profile(
                "U2",
                UserProfile {
                    name: Some("bob".into()),
                    ..Default::default()
                },
            )
            .with_profile("U3", UserProfile::default());
        let messages = vec![
            msg("1.0", "U1", "a"),
            msg("2.0", "U2", "b"),
            msg("3.0", "U3", "c"),
        ];

        let map = resolve_identities(&chat, &messages).await;

        assert_eq!(map.name_for(&UserId("U1".into())), "Alice Wong");
        assert_eq!(map.name_for(&UserId("U2".into())), "bob");
        assert_eq!(map.name_for(&UserId("U3".into())), "U3");
    }

    #[tokio::test]
    async fn authorless_messages_are_skipped() {
        let chat = FakeChat::default();
        let mut system = msg("1.0", "U1", "joined");
        system.user = None;
        let map = resolve_identities(&chat, &[system]).await;
        assert!(map.is_empty());
        assert!(chat.user_calls.lock().unwrap().is_empty());
    }
}
