use std::{convert::Infallible, time::Duration};

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::StreamExt;
use serde_json::json;
use tracing::info;

use crate::{
    config::Settings,
    errors::AppError,
    models::{ExplainRequest, ExplainRequestBody, StreamEvent},
    modes::Mode,
    state::AppState,
};

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    // Probed on every call; availability is never cached because the
    // upstream may change state between requests.
    let backend_available = state.backend.probe().await;
    Json(json!({
        "status": "healthy",
        "backend_available": backend_available,
        "model": state.orchestrator.model_name(),
    }))
}

pub async fn modes() -> Json<serde_json::Value> {
    let names: Vec<&str> = Mode::ALL.iter().map(Mode::as_str).collect();
    let descriptions: serde_json::Map<String, serde_json::Value> = Mode::ALL
        .iter()
        .map(|mode| (mode.as_str().to_owned(), json!(mode.description())))
        .collect();
    Json(json!({
        "modes": names,
        "aliases": { "senior": "review" },
        "descriptions": descriptions,
    }))
}

pub async fn explain(
    State(state): State<AppState>,
    Json(body): Json<ExplainRequestBody>,
) -> Result<Response, AppError> {
    let request = validate(&state.settings, body)?;
    let mode = request.mode;
    let code_length = request.code.chars().count();
    info!(mode = %mode, code_length, "explain request accepted");

    let result = state.orchestrator.explain(request).await;
    if !result.success {
        return Err(AppError::Generation(
            result
                .error
                .unwrap_or_else(|| "failed to generate explanation".to_owned()),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "mode": mode.as_str(),
        "explanation": result.explanation,
        "source": result.source,
        "code_length": code_length,
    }))
    .into_response())
}

pub async fn explain_stream(
    State(state): State<AppState>,
    Json(body): Json<ExplainRequestBody>,
) -> Result<Response, AppError> {
    let request = validate(&state.settings, body)?;
    info!(mode = %request.mode, code_length = request.code.len(), "streaming explain request accepted");

    let outbound = state
        .orchestrator
        .explain_stream(request)
        .map(|event| Ok::<Event, Infallible>(json_event(&event)));

    Ok(Sse::new(outbound)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(10)))
        .into_response())
}

/// Boundary validation: unknown modes, empty code and oversized code are
/// rejected here so the orchestrator only ever sees valid requests.
fn validate(settings: &Settings, body: ExplainRequestBody) -> Result<ExplainRequest, AppError> {
    let code = body.code.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("code cannot be empty".to_owned()));
    }
    // Character count, not byte count; multibyte code bodies get the same
    // budget either way.
    if code.chars().count() > settings.max_code_length {
        return Err(AppError::BadRequest(format!(
            "code too long, maximum length: {} characters",
            settings.max_code_length
        )));
    }
    let Some(mode) = Mode::parse(&body.mode) else {
        return Err(AppError::BadRequest(format!(
            "invalid mode '{}', supported modes: friend, professor, babysitter, review (alias: senior)",
            body.mode
        )));
    };

    Ok(ExplainRequest {
        code: code.to_owned(),
        mode,
    })
}

/// Frame one stream event as an SSE data line, preserving ordering and
/// tagging verbatim.
fn json_event(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(serialized) => Event::default().data(serialized),
        Err(error) => {
            let fallback = StreamEvent::Error {
                message: format!("event serialization failed: {error}"),
            };
            let data = serde_json::to_string(&fallback)
                .unwrap_or_else(|_| r#"{"type":"error","message":"internal error"}"#.to_owned());
            Event::default().data(data)
        }
    }
}
