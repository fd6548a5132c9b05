//! Fake ports shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;

use crate::{
    domain::{ChannelId, Ts, UserId},
    messaging::{
        port::ChatPort,
        types::{Block, EphemeralReply, Message, UserProfile},
    },
    model::client::CompletionClient,
    Error, Result,
};

pub(crate) fn msg(ts: &str, user: &str, text: &str) -> Message {
    Message {
        ts: Ts::new(ts),
        user: Some(UserId(user.to_string())),
        text: Some(text.to_string()),
        ..Default::default()
    }
}

pub(crate) fn root(ts: &str, user: &str, text: &str, reply_count: u32) -> Message {
    Message {
        thread_ts: Some(Ts::new(ts)),
        reply_count: Some(reply_count),
        ..msg(ts, user, text)
    }
}

pub(crate) fn reply(ts: &str, parent: &str, user: &str, text: &str) -> Message {
    Message {
        thread_ts: Some(Ts::new(parent)),
        ..msg(ts, user, text)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Post {
    pub channel: ChannelId,
    pub thread_ts: Option<Ts>,
    pub text: String,
    pub blocks: Vec<Block>,
}

#[derive(Default)]
pub(crate) struct FakeChat {
    pub history: Mutex<HashMap<String, Vec<Message>>>,
    pub threads: Mutex<HashMap<(String, String), Vec<Message>>>,
    pub users: Mutex<HashMap<String, UserProfile>>,
    pub names: Mutex<HashMap<String, String>>,
    pub failing_channels: Mutex<HashSet<String>>,
    pub history_calls: Mutex<Vec<(ChannelId, Option<Ts>, usize)>>,
    pub replies_calls: Mutex<Vec<(ChannelId, Ts)>>,
    pub user_calls: Mutex<Vec<UserId>>,
    pub post_log: Mutex<Vec<Post>>,
    pub ephemerals: Mutex<Vec<(ChannelId, UserId, String)>>,
    pub responses: Mutex<Vec<(String, EphemeralReply)>>,
    next_ts: Mutex<u64>,
}

impl FakeChat {
    pub fn with_history(self, channel: &str, messages: Vec<Message>) -> Self {
        self.history
            .lock()
            .unwrap()
            .insert(channel.to_string(), messages);
        self
    }

    pub fn with_thread(self, channel: &str, ts: &str, messages: Vec<Message>) -> Self {
        self.threads
            .lock()
            .unwrap()
            .insert((channel.to_string(), ts.to_string()), messages);
        self
    }

    pub fn with_user(self, id: &str, display: &str) -> Self {
        self.users.lock().unwrap().insert(
            id.to_string(),
            UserProfile {
                name: Some(id.to_lowercase()),
                display_name_normalized: Some(display.to_string()),
                real_name_normalized: None,
            },
        );
        self
    }

    pub fn with_profile(self, id: &str, profile: UserProfile) -> Self {
        self.users.lock().unwrap().insert(id.to_string(), profile);
        self
    }

    pub fn with_channel_name(self, id: &str, name: &str) -> Self {
        self.names
            .lock()
            .unwrap()
            .insert(id.to_string(), name.to_string());
        self
    }

    pub fn failing(self, channel: &str) -> Self {
        self.failing_channels
            .lock()
            .unwrap()
            .insert(channel.to_string());
        self
    }

    pub fn posts(&self) -> Vec<Post> {
        self.post_log.lock().unwrap().clone()
    }

    pub fn responses(&self) -> Vec<(String, EphemeralReply)> {
        self.responses.lock().unwrap().clone()
    }

    pub fn ephemerals(&self) -> Vec<(ChannelId, UserId, String)> {
        self.ephemerals.lock().unwrap().clone()
    }

    fn check(&self, method: &str, channel: &ChannelId) -> Result<()> {
        if self.failing_channels.lock().unwrap().contains(&channel.0) {
            return Err(Error::Slack {
                method: method.to_string(),
                error: "not_in_channel".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPort for FakeChat {
    async fn history(
        &self,
        channel: &ChannelId,
        oldest: Option<&Ts>,
        limit: usize,
    ) -> Result<Vec<Message>> {
        self.history_calls
            .lock()
            .unwrap()
            .push((channel.clone(), oldest.cloned(), limit));
        self.check("conversations.history", channel)?;
        let mut all = self
            .history
            .lock()
            .unwrap()
            .get(&channel.0)
            .cloned()
            .unwrap_or_default();
        // Slack returns newest first.
        all.sort_by(|a, b| b.ts.cmp(&a.ts));
        all.truncate(limit);
        Ok(all)
    }

    async fn replies(&self, channel: &ChannelId, thread_ts: &Ts) -> Result<Vec<Message>> {
        self.replies_calls
            .lock()
            .unwrap()
            .push((channel.clone(), thread_ts.clone()));
        self.check("conversations.replies", channel)?;
        Ok(self
            .threads
            .lock()
            .unwrap()
            .get(&(channel.0.clone(), thread_ts.0.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn user_info(&self, user: &UserId) -> Result<UserProfile> {
        self.user_calls.lock().unwrap().push(user.clone());
        self.users
            .lock()
            .unwrap()
            .get(&user.0)
            .cloned()
            .ok_or_else(|| Error::Slack {
                method: "users.info".to_string(),
                error: "user_not_found".to_string(),
            })
    }

    async fn channel_name(&self, channel: &ChannelId) -> Result<String> {
        self.names
            .lock()
            .unwrap()
            .get(&channel.0)
            .cloned()
            .ok_or_else(|| Error::Slack {
                method: "conversations.info".to_string(),
                error: "channel_not_found".to_string(),
            })
    }

    async fn post_message(
        &self,
        channel: &ChannelId,
        thread_ts: Option<&Ts>,
        text: &str,
        blocks: &[Block],
    ) -> Result<Ts> {
        self.check("chat.postMessage", channel)?;
        self.post_log.lock().unwrap().push(Post {
            channel: channel.clone(),
            thread_ts: thread_ts.cloned(),
            text: text.to_string(),
            blocks: blocks.to_vec(),
        });
        let mut next = self.next_ts.lock().unwrap();
        *next += 1;
        Ok(Ts::new(format!("1800000000.{:06}", *next)))
    }

    async fn post_ephemeral(&self, channel: &ChannelId, user: &UserId, text: &str) -> Result<()> {
        self.ephemerals
            .lock()
            .unwrap()
            .push((channel.clone(), user.clone(), text.to_string()));
        Ok(())
    }

    async fn respond(&self, response_url: &str, reply: &EphemeralReply) -> Result<()> {
        self.responses
            .lock()
            .unwrap()
            .push((response_url.to_string(), reply.clone()));
        Ok(())
    }
}

/// Completion fake: returns a canned answer and records prompts.
#[derive(Default)]
pub(crate) struct FakeCompletion {
    pub answer: String,
    pub fail: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeCompletion {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(Error::External("completion service unavailable".to_string()));
        }
        Ok(self.answer.clone())
    }
}
