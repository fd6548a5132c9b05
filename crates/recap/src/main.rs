use std::sync::Arc;

use recap_core::{
    config::Config,
    messaging::{
        port::ChatPort,
        throttled::{ThrottleConfig, ThrottledChat},
    },
    pipeline::{RecapSettings, Recapper},
    scheduler::DigestScheduler,
};
use recap_openai::OpenAiCompletionClient;
use recap_slack::{router::AppState, SlackClient};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), recap_core::Error> {
    recap_core::logging::init("recap")?;

    let cfg = Arc::new(Config::load()?);

    // Throttle Slack calls in front of the adapter; the adapter itself still
    // retries once on a 429.
    let slack: Arc<dyn ChatPort> = Arc::new(SlackClient::new(
        cfg.slack_api_base.clone(),
        cfg.slack_bot_token.clone(),
        cfg.request_timeout,
    )?);
    let chat: Arc<dyn ChatPort> = Arc::new(ThrottledChat::new(slack, ThrottleConfig::default()));

    let completion = Arc::new(OpenAiCompletionClient::new(
        cfg.completion_api_url.clone(),
        cfg.completion_api_key.clone(),
        cfg.completion_model.clone(),
        cfg.request_timeout,
    )?);

    let recapper = Arc::new(Recapper::new(
        chat,
        completion,
        RecapSettings::from_config(&cfg),
    ));

    let scheduler = match &cfg.digest {
        Some(digest) => {
            let scheduler = DigestScheduler::new(recapper.clone(), digest.clone(), cfg.limits)?;
            scheduler.start().await;
            Some(scheduler)
        }
        None => {
            info!("no digest channels configured");
            None
        }
    };

    let state = Arc::new(AppState {
        recapper,
        signing_secret: cfg.slack_signing_secret.clone(),
        limits: cfg.limits,
        mention_keyword: cfg.mention_keyword.clone(),
    });

    let served = recap_slack::router::serve(cfg.listen_addr, state).await;

    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }
    served.map_err(|e| recap_core::Error::External(format!("http server failed: {e}")))?;

    Ok(())
}
