//! Recap orchestration: selection → identities → transcript → completion →
//! render → delivery.

use std::sync::Arc;

use chrono::{Local, Utc};
use tracing::{error, info, warn};

use crate::{
    config::Config,
    domain::{ChannelId, Ts},
    identity::{resolve_identities, IdentityMap},
    messaging::{
        port::ChatPort,
        types::{Block, EphemeralReply, TextObject},
    },
    model::{
        client::CompletionClient,
        prompt::{build_prompt, PromptOptions},
    },
    render::{render_summary, Attribution, RenderedSummary, SummaryMeta, MAX_BLOCKS},
    selection::{select_messages, SelectionMode, DEFAULT_MAX_MESSAGES},
    transcript::{build_transcript, TranscriptOptions},
    trigger::{Invocation, ReplyTarget, Target},
    RecapError,
};

pub const DIGEST_PARENT_TEXT: &str = "Daily digest";

#[derive(Clone, Copy, Debug)]
pub struct RecapSettings {
    pub max_messages: usize,
    pub transcript_timestamps: bool,
    /// Digest summaries go in a thread under one parent message.
    pub digest_threaded: bool,
}

impl Default for RecapSettings {
    fn default() -> Self {
        Self {
            max_messages: DEFAULT_MAX_MESSAGES,
            transcript_timestamps: false,
            digest_threaded: true,
        }
    }
}

impl RecapSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_messages: cfg.limits.max_messages,
            transcript_timestamps: cfg.transcript_timestamps,
            digest_threaded: cfg.digest.as_ref().map(|d| d.threaded).unwrap_or(true),
        }
    }
}

/// Outcome of one digest sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub posted: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Recapper {
    chat: Arc<dyn ChatPort>,
    completion: Arc<dyn CompletionClient>,
    settings: RecapSettings,
}

impl Recapper {
    pub fn new(
        chat: Arc<dyn ChatPort>,
        completion: Arc<dyn CompletionClient>,
        settings: RecapSettings,
    ) -> Self {
        Self {
            chat,
            completion,
            settings,
        }
    }

    /// Summarize one target. `Ok(None)` means nothing qualified for the
    /// summary; no completion request is made in that case.
    pub async fn summarize(
        &self,
        target: &Target,
        mode: &SelectionMode,
        attribution: Attribution,
    ) -> Result<Option<RenderedSummary>, RecapError> {
        let cap = self.settings.max_messages;
        let selection = select_messages(self.chat.as_ref(), &target.channel, mode, cap, Utc::now())
            .await
            .map_err(RecapError::Selection)?;

        if selection.is_empty() {
            info!(channel = %target.channel, "no qualifying messages");
            return Ok(None);
        }

        let title = self.resolve_title(target).await;
        let identities = resolve_identities(self.chat.as_ref(), &selection.messages).await;
        let transcript = build_transcript(
            &selection.messages,
            &identities,
            TranscriptOptions {
                timestamps: self.settings.transcript_timestamps,
            },
        );
        let prompt = build_prompt(
            &transcript,
            PromptOptions {
                timestamps: self.settings.transcript_timestamps,
            },
        );

        info!(
            channel = %target.channel,
            messages = selection.messages.len(),
            truncated = selection.truncated,
            "requesting summary"
        );
        let raw = self
            .completion
            .complete(&prompt)
            .await
            .map_err(RecapError::Completion)?;

        let meta = SummaryMeta {
            title,
            attribution,
            truncated_at: selection.truncated.then_some(cap),
            generated_at: Local::now(),
        };
        Ok(Some(render_summary(&raw, &identities, &meta)))
    }

    /// Run an invocation end to end and deliver the result (or a failure
    /// notice) to the requester. Digest invocations run as a sweep.
    pub async fn handle(&self, invocation: Invocation) {
        let Invocation {
            requester,
            targets,
            mode,
            reply,
        } = invocation;

        if let ReplyTarget::Digest { destination } = &reply {
            self.sweep(&targets, &mode, destination).await;
            return;
        }

        let attribution = match &requester {
            Some(user) => Attribution::Requester(user.clone()),
            None => Attribution::Digest,
        };

        let mut summaries = Vec::with_capacity(targets.len());
        for target in &targets {
            let summary = match self.summarize(target, &mode, attribution.clone()).await {
                Ok(Some(summary)) => summary,
                Ok(None) => self.empty_summary(target, attribution.clone()).await,
                Err(e) => {
                    warn!(channel = %target.channel, error = %e, "recap failed");
                    self.notify_failure(&reply, &e).await;
                    return;
                }
            };
            summaries.push(summary);
        }

        for (text, blocks) in pack_messages(summaries) {
            if let Err(e) = self.deliver(&reply, &text, &blocks).await {
                error!(error = %e, "failed to deliver summary");
            }
        }
    }

    /// Digest sweep: channels one at a time, each failure logged and counted.
    pub async fn sweep(
        &self,
        targets: &[Target],
        mode: &SelectionMode,
        destination: &ChannelId,
    ) -> SweepReport {
        let mut report = SweepReport::default();
        let mut parent: Option<Ts> = None;

        for target in targets {
            let summary = match self.summarize(target, mode, Attribution::Digest).await {
                Ok(Some(summary)) => summary,
                Ok(None) => {
                    info!(channel = %target.channel, "digest: nothing to summarize, skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(channel = %target.channel, error = %e, "digest: channel failed");
                    report.failed += 1;
                    continue;
                }
            };

            if self.settings.digest_threaded && parent.is_none() {
                match self.post_digest_parent(destination).await {
                    Ok(ts) => parent = Some(ts),
                    Err(e) => {
                        error!(channel = %target.channel, error = %e, "digest: parent post failed");
                        report.failed += 1;
                        continue;
                    }
                }
            }

            match self
                .chat
                .post_message(
                    destination,
                    parent.as_ref(),
                    &summary.fallback_text(),
                    summary.blocks(),
                )
                .await
            {
                Ok(_) => report.posted += 1,
                Err(e) => {
                    error!(
                        channel = %target.channel,
                        error = %RecapError::Delivery(e),
                        "digest: post failed"
                    );
                    report.failed += 1;
                }
            }
        }

        info!(
            posted = report.posted,
            skipped = report.skipped,
            failed = report.failed,
            "digest sweep finished"
        );
        report
    }

    async fn post_digest_parent(&self, destination: &ChannelId) -> crate::Result<Ts> {
        let when = crate::formatting::format_generated_at(Local::now());
        let blocks = [
            Block::Header {
                text: TextObject::plain(format!("📝 {DIGEST_PARENT_TEXT}")),
            },
            Block::Context {
                elements: vec![TextObject::mrkdwn(format!("_{when}_"))],
            },
        ];
        self.chat
            .post_message(destination, None, DIGEST_PARENT_TEXT, &blocks)
            .await
    }

    async fn empty_summary(&self, target: &Target, attribution: Attribution) -> RenderedSummary {
        let meta = SummaryMeta {
            title: self.resolve_title(target).await,
            attribution,
            truncated_at: None,
            generated_at: Local::now(),
        };
        render_summary("", &IdentityMap::new(), &meta)
    }

    async fn resolve_title(&self, target: &Target) -> String {
        if let Some(title) = &target.title {
            return title.clone();
        }
        match self.chat.channel_name(&target.channel).await {
            Ok(name) => format!("#{name}"),
            Err(e) => {
                warn!(channel = %target.channel, error = %e, "channel name lookup failed");
                format!("#{}", target.channel)
            }
        }
    }

    async fn deliver(&self, reply: &ReplyTarget, text: &str, blocks: &[Block]) -> crate::Result<()> {
        match reply {
            ReplyTarget::ResponseUrl(url) => {
                let reply = EphemeralReply {
                    text: text.to_string(),
                    blocks: blocks.to_vec(),
                };
                self.chat.respond(url, &reply).await
            }
            ReplyTarget::DirectMessage { user, .. } => {
                let dm = ChannelId(user.0.clone());
                self.chat.post_message(&dm, None, text, blocks).await.map(|_| ())
            }
            ReplyTarget::Digest { destination } => self
                .chat
                .post_message(destination, None, text, blocks)
                .await
                .map(|_| ()),
        }
    }

    async fn notify_failure(&self, reply: &ReplyTarget, err: &RecapError) {
        let Some(text) = err.user_message() else {
            return;
        };

        let sent = match reply {
            ReplyTarget::ResponseUrl(url) => self.chat.respond(url, &EphemeralReply::text(text)).await,
            ReplyTarget::DirectMessage { user, origin } => {
                self.chat.post_ephemeral(origin, user, text).await
            }
            ReplyTarget::Digest { .. } => Ok(()),
        };
        if let Err(e) = sent {
            error!(error = %e, "failed to deliver failure notice");
        }
    }
}

/// Group summaries into as few messages as the block limit allows. A summary
/// is never split across messages.
fn pack_messages(summaries: Vec<RenderedSummary>) -> Vec<(String, Vec<Block>)> {
    let mut messages: Vec<(Vec<String>, Vec<Block>)> = Vec::new();
    for summary in summaries {
        let fits = messages
            .last()
            .is_some_and(|(_, blocks)| blocks.len() + summary.blocks().len() <= MAX_BLOCKS);
        if !fits {
            messages.push((Vec::new(), Vec::new()));
        }
        if let Some((titles, blocks)) = messages.last_mut() {
            titles.push(summary.fallback_text());
            blocks.extend(summary.into_blocks());
        }
    }
    messages
        .into_iter()
        .map(|(titles, blocks)| (titles.join(", "), blocks))
        .collect()
}
