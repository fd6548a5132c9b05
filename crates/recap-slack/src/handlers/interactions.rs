//! Message shortcuts ("Recap this thread").

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Form};
use serde::Deserialize;
use tracing::{info, warn};

use recap_core::{
    domain::{ChannelId, Ts, UserId},
    trigger::Trigger,
};

use crate::{handlers::dispatch, router::AppState};

/// Interactive payloads arrive as a form with one JSON `payload` field.
#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Interaction {
    MessageAction {
        #[serde(default)]
        callback_id: String,
        user: IdRef<UserId>,
        channel: IdRef<ChannelId>,
        message: ShortcutMessage,
        response_url: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct IdRef<T> {
    id: T,
}

#[derive(Debug, Deserialize)]
struct ShortcutMessage {
    ts: Ts,
    #[serde(default)]
    thread_ts: Option<Ts>,
}

pub async fn handle_interaction(
    State(state): State<Arc<AppState>>,
    Form(form): Form<InteractionForm>,
) -> StatusCode {
    match parse_shortcut(&form.payload) {
        Ok(Some(trigger)) => {
            dispatch(&state, trigger);
            StatusCode::OK
        }
        Ok(None) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "malformed interaction payload");
            StatusCode::BAD_REQUEST
        }
    }
}

fn parse_shortcut(payload: &str) -> Result<Option<Trigger>, serde_json::Error> {
    let interaction: Interaction = serde_json::from_str(payload)?;
    let Interaction::MessageAction {
        callback_id,
        user,
        channel,
        message,
        response_url,
    } = interaction
    else {
        return Ok(None);
    };

    info!(callback_id = %callback_id, user = %user.id, channel = %channel.id, "message shortcut");
    Ok(Some(Trigger::Shortcut {
        user: user.id,
        channel: channel.id,
        message_ts: message.ts,
        thread_ts: message.thread_ts,
        response_url,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{build_router, tests::*};
    use serde_json::json;
    use tower::ServiceExt;

    fn payload(thread_ts: Option<&str>) -> String {
        let mut message = json!({ "type": "message", "user": "U1", "ts": "1700000003.000300", "text": "done" });
        if let Some(t) = thread_ts {
            message["thread_ts"] = json!(t);
        }
        json!({
            "type": "message_action",
            "callback_id": "recap_thread",
            "trigger_id": "1.2.3",
            "user": { "id": "U9", "name": "sam" },
            "channel": { "id": "C1", "name": "eng" },
            "message": message,
            "response_url": "https://hooks.slack.test/actions/1"
        })
        .to_string()
    }

    fn form_body(payload: &str) -> String {
        let mut body = String::from("payload=");
        for b in payload.bytes() {
            if b.is_ascii_alphanumeric() || b"-_.~".contains(&b) {
                body.push(b as char);
            } else {
                body.push_str(&format!("%{b:02X}"));
            }
        }
        body
    }

    #[test]
    fn shortcut_on_reply_targets_its_thread() {
        let trigger = parse_shortcut(&payload(Some("1700000001.000000")))
            .unwrap()
            .unwrap();
        assert_eq!(
            trigger,
            Trigger::Shortcut {
                user: UserId("U9".into()),
                channel: ChannelId("C1".into()),
                message_ts: Ts::new("1700000003.000300"),
                thread_ts: Some(Ts::new("1700000001.000000")),
                response_url: "https://hooks.slack.test/actions/1".to_string(),
            }
        );
    }

    #[test]
    fn other_interactions_are_ignored() {
        let other = json!({ "type": "block_actions", "actions": [] }).to_string();
        assert!(parse_shortcut(&other).unwrap().is_none());
        assert!(parse_shortcut("not json").is_err());
    }

    #[tokio::test]
    async fn shortcut_on_root_reads_that_thread() {
        let chat = Arc::new(RecordingChat::default());
        let app = build_router(test_state(chat.clone()));
        let resp = app
            .oneshot(signed(
                "/slack/interactions",
                "application/x-www-form-urlencoded",
                &form_body(&payload(None)),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        settle(|| !chat.responses.lock().unwrap().is_empty()).await;
        assert_eq!(
            *chat.replies_calls.lock().unwrap(),
            vec![(ChannelId("C1".into()), Ts::new("1700000003.000300"))]
        );
        let responses = chat.responses.lock().unwrap().clone();
        assert_eq!(responses[0].0, "https://hooks.slack.test/actions/1");
        assert_eq!(responses[0].1.text, "thread summary");
    }
}
