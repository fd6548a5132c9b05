use std::{env, fs, net::SocketAddr, path::Path, time::Duration};

use crate::{domain::ChannelId, errors::Error, selection::SelectionLimits, Result};

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
/// Keyless OpenAI-compatible endpoint used when `COMPLETION_API_URL` is unset.
pub const DEFAULT_COMPLETION_API_URL: &str = "https://ai.hackclub.com/chat/completions";

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Slack
    pub slack_bot_token: String,
    pub slack_signing_secret: String,
    pub slack_api_base: String,

    // Completion service
    pub completion_api_url: String,
    pub completion_api_key: Option<String>,
    pub completion_model: Option<String>,

    // HTTP
    pub listen_addr: SocketAddr,
    pub request_timeout: Duration,

    // Recap behavior
    pub limits: SelectionLimits,
    pub mention_keyword: String,
    pub transcript_timestamps: bool,

    // Scheduled digest (disabled when no channels are configured)
    pub digest: Option<DigestConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestConfig {
    pub channels: Vec<ChannelId>,
    pub destination: ChannelId,
    /// Standard 5-field cron expression, local time.
    pub cron: String,
    /// Post channel summaries as replies under one digest message.
    pub threaded: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // Required env vars
        let slack_bot_token = required("SLACK_BOT_TOKEN")?;
        let slack_signing_secret = required("SLACK_SIGNING_SECRET")?;
        let slack_api_base = env_str("SLACK_API_BASE")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let completion_api_url = env_str("COMPLETION_API_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_COMPLETION_API_URL.to_string());
        let completion_api_key = env_str("COMPLETION_API_KEY").and_then(non_empty);
        let completion_model = env_str("COMPLETION_MODEL").and_then(non_empty);

        let port = env_u64("PORT").unwrap_or(3000);
        let port = u16::try_from(port)
            .map_err(|_| Error::Config(format!("PORT out of range: {port}")))?;
        let listen_addr = SocketAddr::from(([0, 0, 0, 0], port));
        let request_timeout =
            Duration::from_millis(env_u64("REQUEST_TIMEOUT_MS").unwrap_or(30_000));

        let defaults = SelectionLimits::default();
        let limits = SelectionLimits {
            max_messages: env_usize("RECAP_MAX_MESSAGES")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_messages),
            command_history_limit: env_usize("RECAP_HISTORY_LIMIT")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.command_history_limit),
            sweep_history_limit: env_usize("DIGEST_HISTORY_LIMIT")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.sweep_history_limit),
            default_window_days: env_u32("RECAP_DEFAULT_WINDOW_DAYS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.default_window_days),
        };
        let mention_keyword = env_str("RECAP_KEYWORD")
            .and_then(non_empty)
            .unwrap_or_else(|| "recap".to_string());
        let transcript_timestamps = env_bool("TRANSCRIPT_TIMESTAMPS").unwrap_or(false);

        let digest = load_digest_config()?;

        Ok(Self {
            slack_bot_token,
            slack_signing_secret,
            slack_api_base,
            completion_api_url,
            completion_api_key,
            completion_model,
            listen_addr,
            request_timeout,
            limits,
            mention_keyword,
            transcript_timestamps,
            digest,
        })
    }
}

fn load_digest_config() -> Result<Option<DigestConfig>> {
    let channels = parse_csv(env_str("DIGEST_CHANNELS"))
        .into_iter()
        .map(ChannelId)
        .collect::<Vec<_>>();
    if channels.is_empty() {
        return Ok(None);
    }

    let destination = env_str("DIGEST_DESTINATION_CHANNEL")
        .and_then(non_empty)
        .map(|s| ChannelId(s.trim().to_string()))
        .ok_or_else(|| {
            Error::Config(
                "DIGEST_DESTINATION_CHANNEL is required when DIGEST_CHANNELS is set".to_string(),
            )
        })?;

    let cron = env_str("DIGEST_CRON")
        .and_then(non_empty)
        .unwrap_or_else(|| "0 9 * * *".to_string());
    let threaded = env_bool("DIGEST_THREADED").unwrap_or(true);

    Ok(Some(DigestConfig {
        channels,
        destination,
        cron,
        threaded,
    }))
}

fn required(key: &str) -> Result<String> {
    env_str(key)
        .and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv(v: Option<String>) -> Vec<String> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
