use async_trait::async_trait;

use crate::Result;

/// Text-completion port: one prompt in, one generated text out.
///
/// Stateless. Transport timeouts belong to the implementation; the pipeline
/// never retries a failed call.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
