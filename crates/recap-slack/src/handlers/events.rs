//! Events API: URL verification and `app_mention`.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use recap_core::{
    domain::{ChannelId, Ts, UserId},
    trigger::Trigger,
};

use crate::{handlers::dispatch, router::AppState};

pub const RETRY_NUM_HEADER: &str = "x-slack-retry-num";

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Envelope {
    UrlVerification { challenge: String },
    EventCallback { event: Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AppMention {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    user: Option<UserId>,
    #[serde(default)]
    bot_id: Option<String>,
    channel: ChannelId,
    ts: Ts,
    #[serde(default)]
    thread_ts: Option<Ts>,
    #[serde(default)]
    text: String,
}

pub async fn handle_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    let envelope: Envelope = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "unrecognized event payload");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        Envelope::UrlVerification { challenge } => {
            Json(json!({ "challenge": challenge })).into_response()
        }
        Envelope::EventCallback { event } => {
            if let Some(retry) = headers.get(RETRY_NUM_HEADER) {
                info!(retry = ?retry, "ignoring event redelivery");
                return StatusCode::OK.into_response();
            }
            if let Some(trigger) = mention_trigger(event) {
                dispatch(&state, trigger);
            }
            StatusCode::OK.into_response()
        }
        Envelope::Other => StatusCode::OK.into_response(),
    }
}

/// `app_mention` from a person, as a trigger. Everything else is ignored.
fn mention_trigger(event: Value) -> Option<Trigger> {
    let mention: AppMention = serde_json::from_value(event).ok()?;
    if mention.kind != "app_mention" || mention.bot_id.is_some() {
        return None;
    }
    let user = mention.user?;
    Some(Trigger::Mention {
        user,
        channel: mention.channel,
        ts: mention.ts,
        thread_ts: mention.thread_ts,
        text: mention.text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{build_router, tests::*};
    use tower::ServiceExt;

    fn mention_body(text: &str, thread_ts: Option<&str>) -> String {
        let mut event = json!({
            "type": "app_mention",
            "user": "U9",
            "text": text,
            "ts": "1700000005.000100",
            "channel": "C1",
        });
        if let Some(t) = thread_ts {
            event["thread_ts"] = json!(t);
        }
        json!({ "type": "event_callback", "team_id": "T1", "event": event }).to_string()
    }

    #[test]
    fn mention_in_thread_keeps_thread_ts() {
        let v: Value = serde_json::from_str(&mention_body("<@UBOT> recap", Some("1700000001.000000"))).unwrap();
        let trigger = mention_trigger(v["event"].clone()).unwrap();
        assert_eq!(
            trigger,
            Trigger::Mention {
                user: UserId("U9".into()),
                channel: ChannelId("C1".into()),
                ts: Ts::new("1700000005.000100"),
                thread_ts: Some(Ts::new("1700000001.000000")),
                text: "<@UBOT> recap".to_string(),
            }
        );
    }

    #[test]
    fn bot_and_other_events_are_ignored() {
        let bot = json!({ "type": "app_mention", "bot_id": "B1", "user": "U1", "channel": "C1", "ts": "1.0", "text": "recap" });
        assert!(mention_trigger(bot).is_none());
        let reaction = json!({ "type": "reaction_added", "user": "U1", "channel": "C1", "ts": "1.0" });
        assert!(mention_trigger(reaction).is_none());
    }

    #[tokio::test]
    async fn thread_mention_reads_the_thread() {
        let chat = Arc::new(RecordingChat::default());
        let app = build_router(test_state(chat.clone()));
        let resp = app
            .oneshot(signed(
                "/slack/events",
                "application/json",
                &mention_body("<@UBOT> recap", Some("1700000001.000000")),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        settle(|| !chat.posts.lock().unwrap().is_empty()).await;
        let replies = chat.replies_calls.lock().unwrap().clone();
        assert_eq!(
            replies,
            vec![(ChannelId("C1".into()), Ts::new("1700000001.000000"))]
        );
        // Empty thread still yields a (minimal) summary by direct message.
        assert_eq!(*chat.posts.lock().unwrap(), vec![ChannelId("U9".into())]);
    }

    #[tokio::test]
    async fn mention_without_keyword_does_nothing() {
        let chat = Arc::new(RecordingChat::default());
        let app = build_router(test_state(chat.clone()));
        let resp = app
            .oneshot(signed("/slack/events", "application/json", &mention_body("<@UBOT> hi", None)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(chat.history_calls.lock().unwrap().is_empty());
        assert!(chat.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn redeliveries_are_acknowledged_and_dropped() {
        let chat = Arc::new(RecordingChat::default());
        let app = build_router(test_state(chat.clone()));
        let mut req = signed("/slack/events", "application/json", &mention_body("<@UBOT> recap", None));
        req.headers_mut().insert(RETRY_NUM_HEADER, "1".parse().unwrap());
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(chat.history_calls.lock().unwrap().is_empty());
    }
}
