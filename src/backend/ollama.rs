use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    backend::{BackendError, FragmentStream, GenerationBackend},
    config::Settings,
    models::TokenFragment,
};

/// Client for an Ollama-compatible generation API. One instance is shared
/// across all requests; `reqwest::Client` clones share the connection pool
/// and are documented as safe for concurrent use.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    settings: Arc<Settings>,
}

impl OllamaClient {
    pub fn new(settings: Arc<Settings>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.stream_connect_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.settings.base_url)
    }

    fn tags_url(&self) -> String {
        format!("{}/api/tags", self.settings.base_url)
    }

    fn payload(&self, prompt: &str, stream: bool) -> serde_json::Value {
        // Streamed generations keep a floor on num_predict so low-memory
        // configurations still produce usable chunks.
        let num_predict = if stream {
            self.settings.max_tokens.max(64)
        } else {
            self.settings.max_tokens
        };

        let mut payload = json!({
            "model": self.settings.model,
            "prompt": prompt,
            "stream": stream,
            "options": {
                "temperature": self.settings.temperature,
                "top_p": self.settings.top_p,
                "num_predict": num_predict,
                "num_ctx": self.settings.num_ctx,
                "num_gpu": self.settings.num_gpu,
            },
        });
        if let Some(keep_alive) = &self.settings.keep_alive {
            payload["keep_alive"] = json!(keep_alive);
        }
        payload
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
    fn model_name(&self) -> &str {
        &self.settings.model
    }

    async fn probe(&self) -> bool {
        match self
            .client
            .get(self.tags_url())
            .timeout(self.settings.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                warn!(error = %error, "generation backend not reachable");
                false
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.generate_url())
            .timeout(self.settings.request_timeout)
            .json(&self.payload(prompt, false))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status, &body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|error| BackendError::InvalidResponse(error.to_string()))?;
        Ok(parsed.response)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream, BackendError> {
        let response = self
            .client
            .post(self.generate_url())
            .timeout(self.settings.stream_read_timeout)
            .json(&self.payload(prompt, true))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_error(status, &body));
        }

        debug!(model = %self.settings.model, "generation stream opened");
        let upstream = response
            .bytes_stream()
            .map(|next| next.map_err(map_transport_error));
        Ok(decode_ndjson(upstream))
    }
}

/// Decode a byte stream of newline-delimited JSON into token fragments.
/// The buffer holds raw bytes and only complete lines are decoded, so a
/// multibyte character split across transport chunks simply waits for the
/// rest of its bytes. Lines that fail to parse are skipped; consumption
/// stops at the first fragment with `done=true`. Dropping the returned
/// stream drops the upstream body, which releases the connection on every
/// exit path.
fn decode_ndjson<S, B>(mut upstream: S) -> FragmentStream
where
    S: Stream<Item = Result<B, BackendError>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut finished = false;

        while let Some(next) = upstream.next().await {
            let bytes = match next {
                Ok(bytes) => bytes,
                Err(error) => {
                    yield Err(error);
                    finished = true;
                    break;
                }
            };
            buffer.extend_from_slice(bytes.as_ref());

            while let Some(index) = buffer.iter().position(|&byte| byte == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=index).collect();
                let Some(fragment) = parse_fragment_line(&raw) else {
                    continue;
                };

                let done = fragment.done;
                yield Ok(fragment);
                if done {
                    finished = true;
                    break;
                }
            }

            if finished {
                break;
            }
        }

        // The upstream may close without a trailing newline on its last
        // fragment.
        if !finished {
            if let Some(fragment) = parse_fragment_line(&buffer) {
                yield Ok(fragment);
            }
        }
    };

    stream.boxed()
}

/// Parse one complete buffered line. Partial or corrupt lines do not
/// abort the stream; they are skipped.
fn parse_fragment_line(raw: &[u8]) -> Option<TokenFragment> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(fragment) => Some(fragment),
        Err(error) => {
            debug!(error = %error, "skipping unparseable stream line");
            None
        }
    }
}

fn map_transport_error(error: reqwest::Error) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout(error.to_string())
    } else {
        BackendError::ConnectionFailed(error.to_string())
    }
}

/// Classify a non-2xx response. An HTTP 500 or a body mentioning "memory"
/// is treated as resource pressure; this mirrors the upstream's behavior
/// and is a best-effort hint, not a guaranteed distinction.
fn classify_http_error(status: StatusCode, body: &str) -> BackendError {
    let snippet = body.chars().take(400).collect::<String>();
    if status == StatusCode::INTERNAL_SERVER_ERROR || body.to_lowercase().contains("memory") {
        BackendError::ResourcePressure {
            status: status.as_u16(),
            snippet,
        }
    } else {
        BackendError::Status {
            status: status.as_u16(),
            snippet,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;

    fn chunks(parts: &[&str]) -> Vec<Result<Vec<u8>, BackendError>> {
        parts
            .iter()
            .map(|part| Ok(part.as_bytes().to_vec()))
            .collect()
    }

    async fn collect(parts: &[&str]) -> Vec<Result<TokenFragment, BackendError>> {
        decode_ndjson(stream::iter(chunks(parts))).collect().await
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped_and_done_still_arrives() {
        let fragments = collect(&[
            "{not json at all\n",
            "{\"response\":\"\",\"done\":true}\n",
        ])
        .await;

        assert_eq!(fragments.len(), 1);
        let fragment = fragments[0].as_ref().expect("fragment");
        assert!(fragment.done);
    }

    #[tokio::test]
    async fn consumption_stops_at_the_completion_signal() {
        let fragments = collect(&[
            "{\"response\":\"a\",\"done\":false}\n{\"done\":true}\n",
            "{\"response\":\"never seen\",\"done\":false}\n",
        ])
        .await;

        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[0].as_ref().expect("fragment").response.as_deref(),
            Some("a")
        );
        assert!(fragments[1].as_ref().expect("fragment").done);
    }

    #[tokio::test]
    async fn done_without_text_is_a_valid_end_of_stream() {
        let fragments = collect(&["{\"done\":true}\n"]).await;
        assert_eq!(fragments.len(), 1);
        let fragment = fragments[0].as_ref().expect("fragment");
        assert!(fragment.done);
        assert!(fragment.response.is_none());
    }

    #[tokio::test]
    async fn fragments_split_across_byte_chunks_are_reassembled() {
        let fragments = collect(&["{\"response\":\"he", "llo\",\"done\":false}\n{\"done\":true}\n"])
            .await;

        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[0].as_ref().expect("fragment").response.as_deref(),
            Some("hello")
        );
    }

    #[tokio::test]
    async fn multibyte_characters_split_across_chunks_are_reassembled() {
        // Transport chunk boundaries are arbitrary; split the two-byte
        // encoding of 'é' across two chunks.
        let full = "{\"response\":\"café\",\"done\":false}\n{\"done\":true}\n".as_bytes();
        let split_at = full.iter().position(|&byte| byte == 0xC3).expect("multibyte start") + 1;
        let parts: Vec<Result<Vec<u8>, BackendError>> = vec![
            Ok(full[..split_at].to_vec()),
            Ok(full[split_at..].to_vec()),
        ];
        let fragments: Vec<_> = decode_ndjson(stream::iter(parts)).collect().await;

        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[0].as_ref().expect("fragment").response.as_deref(),
            Some("café")
        );
        assert!(fragments[1].as_ref().expect("fragment").done);
    }

    #[tokio::test]
    async fn trailing_fragment_without_newline_is_parsed() {
        let fragments = collect(&["{\"response\":\"tail\",\"done\":false}"]).await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(
            fragments[0].as_ref().expect("fragment").response.as_deref(),
            Some("tail")
        );
    }

    #[tokio::test]
    async fn transport_errors_surface_and_end_the_stream() {
        let parts: Vec<Result<Vec<u8>, BackendError>> = vec![
            Ok(b"{\"response\":\"a\",\"done\":false}\n".to_vec()),
            Err(BackendError::ConnectionFailed("reset".to_owned())),
        ];
        let fragments: Vec<_> = decode_ndjson(stream::iter(parts)).collect().await;

        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].is_ok());
        assert!(matches!(
            fragments[1],
            Err(BackendError::ConnectionFailed(_))
        ));
    }

    #[test]
    fn http_500_and_memory_bodies_classify_as_resource_pressure() {
        assert!(matches!(
            classify_http_error(StatusCode::INTERNAL_SERVER_ERROR, "model crashed"),
            BackendError::ResourcePressure { status: 500, .. }
        ));
        assert!(matches!(
            classify_http_error(StatusCode::SERVICE_UNAVAILABLE, "Out Of Memory"),
            BackendError::ResourcePressure { status: 503, .. }
        ));
        assert!(matches!(
            classify_http_error(StatusCode::NOT_FOUND, "model not found"),
            BackendError::Status { status: 404, .. }
        ));
    }

    #[test]
    fn long_error_bodies_are_truncated_to_a_snippet() {
        let body = "x".repeat(2000);
        match classify_http_error(StatusCode::BAD_REQUEST, &body) {
            BackendError::Status { snippet, .. } => assert_eq!(snippet.len(), 400),
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
