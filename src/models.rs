use serde::{Deserialize, Serialize};

use crate::modes::Mode;

pub const SOURCE_BACKEND: &str = "backend";
pub const SOURCE_SYNTHETIC: &str = "synthetic-fallback";

/// Raw `/explain` request body, before boundary validation.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplainRequestBody {
    pub code: String,
    pub mode: String,
}

/// A validated generation request. Mode aliases are already resolved;
/// the request is owned by exactly one orchestration call.
#[derive(Debug, Clone)]
pub struct ExplainRequest {
    pub code: String,
    pub mode: Mode,
}

/// Uniform outcome of a one-shot generation. Exactly one of
/// `explanation`/`error` is present depending on `success`; `source`
/// records provenance so callers can tell a live answer from a fallback.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub source: &'static str,
}

impl GenerationResult {
    pub fn backend(explanation: String) -> Self {
        Self {
            success: true,
            explanation: Some(explanation),
            error: None,
            source: SOURCE_BACKEND,
        }
    }

    pub fn synthetic(explanation: String) -> Self {
        Self {
            success: true,
            explanation: Some(explanation),
            error: None,
            source: SOURCE_SYNTHETIC,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            explanation: None,
            error: Some(message.into()),
            source: SOURCE_BACKEND,
        }
    }
}

/// One event of a streaming explanation. Per stream: exactly one `Start`
/// first, then ordered `Chunk`s whose `accumulated` is the running
/// concatenation of every `content` so far, then exactly one terminal
/// `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Start { mode: String, model: String },
    Chunk { content: String, accumulated: String },
    Done { full_text: String, model: String },
    Error { message: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}

/// One newline-delimited JSON fragment of the backend's streaming body.
/// `response` may be absent on the final fragment; `done` with or without
/// text is a valid end-of-stream signal.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TokenFragment {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_constructors_keep_exactly_one_side_populated() {
        let ok = GenerationResult::backend("text".to_owned());
        assert!(ok.success);
        assert!(ok.explanation.is_some() && ok.error.is_none());
        assert_eq!(ok.source, SOURCE_BACKEND);

        let fallback = GenerationResult::synthetic("text".to_owned());
        assert!(fallback.success);
        assert_eq!(fallback.source, SOURCE_SYNTHETIC);

        let failed = GenerationResult::failure("empty response from model");
        assert!(!failed.success);
        assert!(failed.explanation.is_none() && failed.error.is_some());
    }

    #[test]
    fn stream_events_serialize_with_lowercase_type_tags() {
        let start = StreamEvent::Start {
            mode: "friend".to_owned(),
            model: "test-model".to_owned(),
        };
        let serialized = serde_json::to_string(&start).expect("serialize");
        assert!(serialized.contains(r#""type":"start""#));

        let chunk = StreamEvent::Chunk {
            content: "hi ".to_owned(),
            accumulated: "hi".to_owned(),
        };
        let serialized = serde_json::to_string(&chunk).expect("serialize");
        assert!(serialized.contains(r#""type":"chunk""#));
        assert!(serialized.contains(r#""accumulated":"hi""#));

        let done = StreamEvent::Done {
            full_text: "hi".to_owned(),
            model: "test-model".to_owned(),
        };
        assert!(serde_json::to_string(&done)
            .expect("serialize")
            .contains(r#""type":"done""#));

        let error = StreamEvent::Error {
            message: "internal error".to_owned(),
        };
        assert!(serde_json::to_string(&error)
            .expect("serialize")
            .contains(r#""type":"error""#));
    }

    #[test]
    fn token_fragment_tolerates_missing_fields() {
        let fragment: TokenFragment = serde_json::from_str(r#"{"done":true}"#).expect("parse");
        assert!(fragment.done);
        assert!(fragment.response.is_none());

        let fragment: TokenFragment =
            serde_json::from_str(r#"{"response":"tok","done":false}"#).expect("parse");
        assert_eq!(fragment.response.as_deref(), Some("tok"));
        assert!(!fragment.done);
    }
}
