/// Core error type for the recap bot.
///
/// Adapter crates should map their specific errors into this type so the
/// pipeline can decide what the requester gets to see.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("slack {method} failed: {error}")]
    Slack { method: String, error: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A failed recap, tagged with the pipeline stage that failed.
#[derive(Debug, thiserror::Error)]
pub enum RecapError {
    #[error("message selection failed: {0}")]
    Selection(#[source] Error),

    #[error("completion request failed: {0}")]
    Completion(#[source] Error),

    #[error("summary delivery failed: {0}")]
    Delivery(#[source] Error),
}

impl RecapError {
    /// Text shown to the requester. Delivery failures have nobody left to tell.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            RecapError::Selection(_) => Some(
                "Sorry, I couldn't read that conversation. Please make sure I'm a member of the target channel.",
            ),
            RecapError::Completion(_) => Some("Sorry, I couldn't generate a summary."),
            RecapError::Delivery(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_failures_point_at_channel_membership() {
        let err = RecapError::Selection(Error::Slack {
            method: "conversations.history".to_string(),
            error: "not_in_channel".to_string(),
        });
        assert!(err.user_message().unwrap().contains("member of the target channel"));
        assert!(err.to_string().contains("not_in_channel"));
    }

    #[test]
    fn delivery_failures_are_not_shown() {
        let err = RecapError::Delivery(Error::External("boom".to_string()));
        assert!(err.user_message().is_none());
    }
}
