//! `/recap [#channel-1] [#channel-2] ... [Nd]`

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Form, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use recap_core::{
    domain::{ChannelId, UserId},
    trigger::Trigger,
};

use crate::{handlers::dispatch, router::AppState};

pub const ACK_TEXT: &str = "Working on your recap…";

#[derive(Debug, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub user_id: UserId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub channel_name: Option<String>,
    pub response_url: String,
}

impl SlashCommand {
    fn into_trigger(self) -> Trigger {
        Trigger::Command {
            user: self.user_id,
            channel: self.channel_id,
            // Slack sends "directmessage" / "privategroup" for non-channels.
            channel_name: self
                .channel_name
                .filter(|n| n != "directmessage" && n != "privategroup"),
            text: self.text,
            response_url: self.response_url,
        }
    }
}

pub async fn handle_command(
    State(state): State<Arc<AppState>>,
    Form(cmd): Form<SlashCommand>,
) -> impl IntoResponse {
    info!(command = %cmd.command, user = %cmd.user_id, channel = %cmd.channel_id, "slash command");
    dispatch(&state, cmd.into_trigger());
    Json(json!({ "response_type": "ephemeral", "text": ACK_TEXT }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{build_router, tests::*};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    const FORM: &str = "token=x&team_id=T1&channel_id=C0&channel_name=general&user_id=U9&user_name=sam&command=%2Frecap&text=%3C%23C1%7Ceng%3E+%3C%23C2%7Cops%3E+3d&response_url=https%3A%2F%2Fhooks.slack.test%2Fcommands%2F1&trigger_id=1.2.3";

    #[tokio::test]
    async fn command_is_acknowledged_then_answered_via_response_url() {
        let chat = Arc::new(RecordingChat::default());
        let app = build_router(test_state(chat.clone()));
        let resp = app
            .oneshot(signed(
                "/slack/commands",
                "application/x-www-form-urlencoded",
                FORM,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["text"], ACK_TEXT);

        settle(|| !chat.responses.lock().unwrap().is_empty()).await;
        assert_eq!(
            *chat.history_calls.lock().unwrap(),
            vec![ChannelId("C1".into()), ChannelId("C2".into())]
        );
        let responses = chat.responses.lock().unwrap().clone();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, "https://hooks.slack.test/commands/1");
        assert_eq!(responses[0].1.text, "#eng summary, #ops summary");
    }

    #[test]
    fn dm_channel_names_are_dropped() {
        let cmd = SlashCommand {
            command: "/recap".into(),
            text: String::new(),
            user_id: UserId("U9".into()),
            channel_id: ChannelId("D1".into()),
            channel_name: Some("directmessage".into()),
            response_url: "https://hooks.slack.test/r".into(),
        };
        match cmd.into_trigger() {
            Trigger::Command { channel_name, .. } => assert!(channel_name.is_none()),
            other => panic!("unexpected trigger {other:?}"),
        }
    }
}
