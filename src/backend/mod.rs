pub mod mock;
pub mod ollama;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use thiserror::Error;

use crate::models::TokenFragment;

pub type FragmentStream = BoxStream<'static, Result<TokenFragment, BackendError>>;

/// A text-generation backend. Implementations must be safe for concurrent
/// use; the orchestrator shares one instance across all in-flight requests.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn model_name(&self) -> &str;

    /// Availability probe. Folds every failure into `false`; results are
    /// never cached because the upstream may change state between requests.
    async fn probe(&self) -> bool;

    /// Single-shot generation returning the full response text.
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;

    /// Incremental generation. The returned stream yields parsed token
    /// fragments and releases the underlying connection when dropped.
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream, BackendError>;
}

/// Closed failure taxonomy surfaced to the orchestrator. Carries status
/// codes and body snippets for logging; raw detail never reaches callers.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend timeout: {0}")]
    Timeout(String),
    #[error("backend unreachable: {0}")]
    ConnectionFailed(String),
    #[error("backend resource pressure (status {status}): {snippet}")]
    ResourcePressure { status: u16, snippet: String },
    #[error("backend request failed (status {status}): {snippet}")]
    Status { status: u16, snippet: String },
    #[error("backend invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Timeouts and connection failures get the configured pre-fallback
    /// wait before we switch to the synthetic responder; a slow-but-alive
    /// backend may still finish. Hard rejections fall back immediately.
    pub fn wants_fallback_delay(&self) -> bool {
        matches!(
            self,
            BackendError::Timeout(_) | BackendError::ConnectionFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_and_connection_failures_get_the_delay() {
        assert!(BackendError::Timeout("deadline".to_owned()).wants_fallback_delay());
        assert!(BackendError::ConnectionFailed("refused".to_owned()).wants_fallback_delay());
        assert!(!BackendError::ResourcePressure {
            status: 500,
            snippet: "out of memory".to_owned()
        }
        .wants_fallback_delay());
        assert!(!BackendError::Status {
            status: 404,
            snippet: "model not found".to_owned()
        }
        .wants_fallback_delay());
        assert!(!BackendError::InvalidResponse("bad json".to_owned()).wants_fallback_delay());
    }
}
