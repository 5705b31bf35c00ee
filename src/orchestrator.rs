use std::sync::Arc;

use futures_util::{stream::BoxStream, StreamExt};
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    backend::{BackendError, GenerationBackend},
    config::Settings,
    fallback::synthesize,
    models::{ExplainRequest, GenerationResult, StreamEvent, SOURCE_SYNTHETIC},
    modes::build_prompt,
};

pub type EventStream = BoxStream<'static, StreamEvent>;

/// The generation request orchestrator. Decides live-vs-synthetic routing,
/// drives the streaming event protocol, and normalizes every outcome into
/// one result/event shape. Holds no cross-request state; concurrent
/// requests share it without coordination.
#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn GenerationBackend>,
    settings: Arc<Settings>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn GenerationBackend>, settings: Arc<Settings>) -> Self {
        Self { backend, settings }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// One-shot explanation. Backend failures are recovered locally by the
    /// synthetic responder; the only failure a caller can see is an empty
    /// success response from the model.
    pub async fn explain(&self, request: ExplainRequest) -> GenerationResult {
        let request_id = format!("req_{}", Uuid::new_v4());

        if self.settings.fallback_first {
            info!(%request_id, mode = %request.mode, "fallback-first policy active, synthesizing locally");
            return GenerationResult::synthetic(synthesize(&request.code, request.mode));
        }

        let prompt = build_prompt(&request.code, request.mode);
        match self.backend.generate(&prompt).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    // An empty 200 is a distinct failure, not a fallback
                    // trigger and not a silent success.
                    warn!(%request_id, "backend returned an empty response");
                    GenerationResult::failure("empty response from model")
                } else {
                    info!(%request_id, chars = text.len(), "backend explanation produced");
                    GenerationResult::backend(text.to_owned())
                }
            }
            Err(error) => {
                warn!(%request_id, error = %error, "backend generation failed, switching to synthetic fallback");
                if error.wants_fallback_delay() {
                    delay_before_fallback(&self.settings).await;
                }
                GenerationResult::synthetic(synthesize(&request.code, request.mode))
            }
        }
    }

    /// Streaming explanation. Emits exactly one `Start`, ordered `Chunk`s
    /// with a monotonically growing `accumulated`, and exactly one
    /// terminal event. Backend failures at open time or mid-stream resolve
    /// to a synthetic `Done`, never a bare `Error`; already-relayed
    /// content is kept and never duplicated.
    pub fn explain_stream(&self, request: ExplainRequest) -> EventStream {
        let backend = self.backend.clone();
        let settings = self.settings.clone();
        let model = backend.model_name().to_owned();

        let events = async_stream::stream! {
            let request_id = format!("req_{}", Uuid::new_v4());
            yield StreamEvent::Start {
                mode: request.mode.as_str().to_owned(),
                model: model.clone(),
            };

            let mut accumulated = String::new();
            let mut completed = false;

            if !settings.fallback_first {
                let prompt = build_prompt(&request.code, request.mode);
                let mut failure: Option<BackendError> = None;
                match backend.generate_stream(&prompt).await {
                    Ok(mut fragments) => {
                        while let Some(next) = fragments.next().await {
                            match next {
                                Ok(fragment) => {
                                    if let Some(delta) =
                                        fragment.response.filter(|delta| !delta.is_empty())
                                    {
                                        accumulated.push_str(&delta);
                                        yield StreamEvent::Chunk {
                                            content: delta,
                                            accumulated: accumulated.clone(),
                                        };
                                    }
                                    if fragment.done {
                                        completed = true;
                                        break;
                                    }
                                }
                                Err(error) => {
                                    failure = Some(error);
                                    break;
                                }
                            }
                        }

                        if completed {
                            info!(%request_id, chars = accumulated.len(), "backend stream completed");
                            yield StreamEvent::Done {
                                full_text: accumulated.clone(),
                                model: model.clone(),
                            };
                        } else if failure.is_none() {
                            // A stream that ends without a completion signal
                            // is as broken as one that errors.
                            failure = Some(BackendError::InvalidResponse(
                                "stream ended without completion signal".to_owned(),
                            ));
                        }
                    }
                    Err(error) => failure = Some(error),
                }

                if let Some(error) = failure {
                    warn!(%request_id, error = %error, "backend stream failed, switching to synthetic fallback");
                    if error.wants_fallback_delay() {
                        delay_before_fallback(&settings).await;
                    }
                }
            } else {
                info!(%request_id, mode = %request.mode, "fallback-first policy active, streaming synthetic explanation");
            }

            if !completed {
                // Synthetic continuation: one word plus trailing space per
                // chunk, appended after whatever backend prefix was already
                // relayed so `accumulated` keeps growing monotonically.
                let text = synthesize(&request.code, request.mode);
                for word in text.split_whitespace() {
                    let content = format!("{word} ");
                    accumulated.push_str(&content);
                    yield StreamEvent::Chunk {
                        content,
                        accumulated: accumulated.trim_end().to_owned(),
                    };
                }

                yield StreamEvent::Done {
                    full_text: accumulated,
                    model: SOURCE_SYNTHETIC.to_owned(),
                };
            }
        };

        events.boxed()
    }
}

async fn delay_before_fallback(settings: &Settings) {
    // Deliberate wait so a slow-but-alive backend can finish; the value is
    // clamped at configuration time.
    if !settings.fallback_delay.is_zero() {
        info!(
            delay_secs = settings.fallback_delay.as_secs(),
            "waiting before synthetic fallback"
        );
        sleep(settings.fallback_delay).await;
    }
}
