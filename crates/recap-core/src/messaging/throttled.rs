use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChannelId, Ts, UserId},
    messaging::{
        port::ChatPort,
        types::{Block, EphemeralReply, Message, UserProfile},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* Web API calls.
    pub global_min_interval: Duration,
    /// Minimum spacing between posts into the same channel.
    pub per_channel_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_channel_min_interval: Duration::from_millis(1050), // ~1 post/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// ChatPort decorator that spaces out outbound calls.
///
/// Enrichment fetches one thread per root message, and a sweep posts several
/// summaries into one channel; both burst. This keeps them under Slack's rate
/// tiers in the common case. It does not retry anything.
pub struct ThrottledChat {
    inner: Arc<dyn ChatPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_channel: Mutex<HashMap<String, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledChat {
    pub fn new(inner: Arc<dyn ChatPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_channel: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_channel(&self, channel: &ChannelId) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_channel.lock().await;
        map.entry(channel.0.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_channel_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_channel(&self, channel: &ChannelId) {
        let global_wait = { self.global.lock().await.reserve() };
        let channel_wait = {
            let lim = self.limiter_for_channel(channel).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(channel_wait);
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }

    async fn throttle_global(&self) {
        let wait = { self.global.lock().await.reserve() };
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl ChatPort for ThrottledChat {
    async fn history(
        &self,
        channel: &ChannelId,
        oldest: Option<&Ts>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.throttle_global().await;
        self.inner.history(channel, oldest, limit).await
    }

    async fn replies(&self, channel: &ChannelId, thread_ts: &Ts) -> Result<Vec<Message>> {
        self.throttle_global().await;
        self.inner.replies(channel, thread_ts).await
    }

    async fn user_info(&self, user: &UserId) -> Result<UserProfile> {
        self.throttle_global().await;
        self.inner.user_info(user).await
    }

    async fn channel_name(&self, channel: &ChannelId) -> Result<String> {
        self.throttle_global().await;
        self.inner.channel_name(channel).await
    }

    async fn post_message(
        &self,
        channel: &ChannelId,
        thread_ts: Option<&Ts>,
        text: &str,
        blocks: &[Block],
    ) -> Result<Ts> {
        self.throttle_channel(channel).await;
        self.inner.post_message(channel, thread_ts, text, blocks).await
    }

    async fn post_ephemeral(&self, channel: &ChannelId, user: &UserId, text: &str) -> Result<()> {
        self.throttle_channel(channel).await;
        self.inner.post_ephemeral(channel, user, text).await
    }

    async fn respond(&self, response_url: &str, reply: &EphemeralReply) -> Result<()> {
        // Response URLs are not channel-scoped Web API calls.
        self.inner.respond(response_url, reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChat;

    #[test]
    fn limiter_spaces_reservations() {
        let mut lim = IntervalLimiter::new(Duration::from_millis(100));
        assert_eq!(lim.reserve(), Duration::ZERO);
        let second = lim.reserve();
        assert!(second > Duration::from_millis(50));
        assert!(second <= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn posts_to_one_channel_are_spaced() {
        let fake = Arc::new(FakeChat::default());
        let chat = ThrottledChat::new(fake.clone(), ThrottleConfig::default());
        let channel = ChannelId("C1".into());

        let started = Instant::now();
        chat.post_message(&channel, None, "a", &[]).await.unwrap();
        chat.post_message(&channel, None, "b", &[]).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1050));
        assert_eq!(fake.posts().len(), 2);
    }
}
