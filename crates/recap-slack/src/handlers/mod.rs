//! Slack request handlers.
//!
//! Each handler is a small adapter that:
//! - decodes Slack's payload into a core `Trigger`
//! - acknowledges immediately (Slack wants an answer within 3 seconds)
//! - runs the recap pipeline in a spawned task

use std::sync::Arc;

use recap_core::trigger::Trigger;
use tracing::debug;

use crate::router::AppState;

pub mod commands;
pub mod events;
pub mod interactions;

/// Normalize and spawn. Returns `false` when the trigger asks for nothing.
pub(crate) fn dispatch(state: &Arc<AppState>, trigger: Trigger) -> bool {
    let Some(invocation) = trigger.normalize(&state.limits, &state.mention_keyword) else {
        debug!("trigger ignored");
        return false;
    };

    let recapper = state.recapper.clone();
    tokio::spawn(async move {
        recapper.handle(invocation).await;
    });
    true
}
