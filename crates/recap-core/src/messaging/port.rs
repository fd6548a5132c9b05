use async_trait::async_trait;

use crate::{
    domain::{ChannelId, Ts, UserId},
    messaging::types::{Block, EphemeralReply, Message, UserProfile},
    Result,
};

/// Chat-platform port.
///
/// Slack is the implementation today. Everything the recap pipeline needs from
/// the platform goes through here, so the pipeline can run against fakes.
#[async_trait]
pub trait ChatPort: Send + Sync {
    /// Most recent channel history, newest first, at most `limit` entries.
    async fn history(
        &self,
        channel: &ChannelId,
        oldest: Option<&Ts>,
        limit: usize,
    ) -> Result<Vec<Message>>;

    /// Every entry of a thread, root first.
    async fn replies(&self, channel: &ChannelId, thread_ts: &Ts) -> Result<Vec<Message>>;

    async fn user_info(&self, user: &UserId) -> Result<UserProfile>;

    async fn channel_name(&self, channel: &ChannelId) -> Result<String>;

    async fn post_message(
        &self,
        channel: &ChannelId,
        thread_ts: Option<&Ts>,
        text: &str,
        blocks: &[Block],
    ) -> Result<Ts>;

    async fn post_ephemeral(&self, channel: &ChannelId, user: &UserId, text: &str) -> Result<()>;

    /// Reply through an interaction's `response_url`.
    async fn respond(&self, response_url: &str, reply: &EphemeralReply) -> Result<()>;
}
