use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::{BackendError, FragmentStream, GenerationBackend};
use crate::models::TokenFragment;

/// Scriptable failure kinds. Cloneable so one script can be replayed for
/// both the sync and streaming call shapes.
#[derive(Debug, Clone)]
pub enum MockFailure {
    Timeout,
    ConnectionRefused,
    ResourcePressure,
    HttpStatus(u16),
}

impl MockFailure {
    pub fn into_error(self) -> BackendError {
        match self {
            MockFailure::Timeout => BackendError::Timeout("mock deadline exceeded".to_owned()),
            MockFailure::ConnectionRefused => {
                BackendError::ConnectionFailed("mock connection refused".to_owned())
            }
            MockFailure::ResourcePressure => BackendError::ResourcePressure {
                status: 500,
                snippet: "mock: model requires more system memory".to_owned(),
            },
            MockFailure::HttpStatus(status) => BackendError::Status {
                status,
                snippet: "mock upstream rejection".to_owned(),
            },
        }
    }
}

/// Test double for the generation backend with scriptable outcomes.
#[derive(Debug, Clone)]
pub struct MockResponder {
    model: String,
    available: bool,
    sync_text: String,
    sync_failure: Option<MockFailure>,
    open_failure: Option<MockFailure>,
    fragments: Vec<Result<TokenFragment, MockFailure>>,
}

impl MockResponder {
    /// Backend that answers every call with `text` (streamed as one text
    /// fragment followed by a completion fragment).
    pub fn replying(text: &str) -> Self {
        Self {
            model: "mock-model".to_owned(),
            available: true,
            sync_text: text.to_owned(),
            sync_failure: None,
            open_failure: None,
            fragments: vec![
                Ok(TokenFragment {
                    response: Some(text.to_owned()),
                    done: false,
                }),
                Ok(TokenFragment {
                    response: None,
                    done: true,
                }),
            ],
        }
    }

    /// Backend that fails every call (sync error, stream-open error).
    pub fn failing(failure: MockFailure) -> Self {
        Self {
            model: "mock-model".to_owned(),
            available: false,
            sync_text: String::new(),
            sync_failure: Some(failure.clone()),
            open_failure: Some(failure),
            fragments: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_owned();
        self
    }

    /// Replace the streaming script; the stream opens successfully and then
    /// replays the given fragments/failures in order.
    pub fn with_fragments(mut self, fragments: Vec<Result<TokenFragment, MockFailure>>) -> Self {
        self.open_failure = None;
        self.fragments = fragments;
        self
    }
}

#[async_trait]
impl GenerationBackend for MockResponder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn probe(&self) -> bool {
        self.available
    }

    async fn generate(&self, _prompt: &str) -> Result<String, BackendError> {
        match &self.sync_failure {
            Some(failure) => Err(failure.clone().into_error()),
            None => Ok(self.sync_text.clone()),
        }
    }

    async fn generate_stream(&self, _prompt: &str) -> Result<FragmentStream, BackendError> {
        if let Some(failure) = &self.open_failure {
            return Err(failure.clone().into_error());
        }

        let fragments = self.fragments.clone();
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            for fragment in fragments {
                if tx
                    .send(fragment.map_err(MockFailure::into_error))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        });
        Ok(ReceiverStream::new(rx).boxed())
    }
}
