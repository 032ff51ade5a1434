use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::deck::{PresentationRequest, PresentationType, Tone};
use crate::core::llm::{LlmProvider, ModelProfile};
use crate::core::pipeline::{
    GenerationContext, GenerationOptions, GenerationProgress, IterativeGenerationResult,
    IterativeOrchestrator, PipelineError,
};

use super::super::AppState;

const MAX_REFINEMENT_ROUNDS: u32 = 10;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SlideCount {
    Number(i64),
    Text(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfigBody {
    pub target_quality_score: Option<f64>,
    pub max_refinement_rounds: Option<u32>,
    pub minimum_improvement: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default, alias = "presentationType")]
    pub presentation_type: Option<String>,
    #[serde(default, alias = "slideCount")]
    pub slide_count: Option<SlideCount>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(default, rename = "validationConfig")]
    pub validation_config: Option<ValidationConfigBody>,
    #[serde(default, rename = "streamProgress")]
    pub stream_progress: bool,
}

impl GenerateRequest {
    /// Checks the body and builds the pipeline request. Runs before any
    /// provider is constructed.
    pub fn to_request(&self) -> Result<PresentationRequest, PipelineError> {
        let invalid = |msg: String| PipelineError::InvalidRequest(msg);

        let presentation_type = match self.presentation_type.as_deref() {
            None => return Err(invalid("presentation_type is required".to_string())),
            Some(raw) => PresentationType::parse(raw)
                .ok_or_else(|| invalid(format!("unknown presentation_type '{}'", raw)))?,
        };
        let slide_count = match &self.slide_count {
            None => return Err(invalid("slide_count is required".to_string())),
            Some(SlideCount::Number(n)) => usize::try_from(*n).unwrap_or(0),
            Some(SlideCount::Text(raw)) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid(format!("slide_count '{}' is not an integer", raw)))?,
        };
        let tone = match self.tone.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            None => Tone::default(),
            Some(raw) => {
                Tone::parse(raw).ok_or_else(|| invalid(format!("unknown tone '{}'", raw)))?
            }
        };
        PresentationRequest::new(
            &self.prompt,
            presentation_type,
            slide_count,
            self.audience.as_deref(),
            tone,
        )
    }

    /// Server options with the request's `validationConfig` applied on top.
    /// Sending a `validationConfig` turns refinement on even when the server
    /// config disables it.
    pub fn apply_validation_config(
        &self,
        mut options: GenerationOptions,
    ) -> Result<GenerationOptions, PipelineError> {
        let Some(body) = &self.validation_config else {
            return Ok(options);
        };
        let mut refinement = options.refinement.unwrap_or_default();
        if let Some(target) = body.target_quality_score {
            if !(0.0..=100.0).contains(&target) {
                return Err(PipelineError::InvalidRequest(
                    "validationConfig.targetQualityScore must be between 0 and 100".to_string(),
                ));
            }
            refinement.target_quality_score = target;
        }
        if let Some(rounds) = body.max_refinement_rounds {
            if rounds > MAX_REFINEMENT_ROUNDS {
                return Err(PipelineError::InvalidRequest(format!(
                    "validationConfig.maxRefinementRounds must be at most {}",
                    MAX_REFINEMENT_ROUNDS
                )));
            }
            refinement.max_refinement_rounds = rounds;
        }
        if let Some(min) = body.minimum_improvement {
            if !min.is_finite() || min < 0.0 {
                return Err(PipelineError::InvalidRequest(
                    "validationConfig.minimumImprovement must be zero or more".to_string(),
                ));
            }
            refinement.minimum_improvement = min;
        }
        options.refinement = Some(refinement);
        Ok(options)
    }
}

/// Success and failure bodies share this shape in both response modes.
pub(crate) fn result_body(result: &IterativeGenerationResult) -> (StatusCode, Value) {
    if result.success {
        (
            StatusCode::OK,
            json!({
                "success": true,
                "presentation": result.presentation,
                "generation_id": result.generation_id,
                "validationResults": result.validation_results,
                "processingTime": result.processing_time_ms,
                "debugInfo": result.debug_info,
            }),
        )
    } else {
        let status = result
            .error_status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (
            status,
            json!({
                "success": false,
                "error": result.errors.join("; "),
                "generation_id": result.generation_id,
            }),
        )
    }
}

fn failure(status: StatusCode, error: &str, generation_id: &str) -> Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": error,
            "generation_id": generation_id,
        })),
    )
        .into_response()
}

fn pipeline_failure(err: &PipelineError, generation_id: &str) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    failure(status, &err.to_string(), generation_id)
}

pub async fn generate_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Response {
    let generation_id = uuid::Uuid::new_v4().to_string();
    let payload = match payload {
        Ok(Json(p)) => p,
        Err(rejection) => {
            return failure(
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {}", rejection.body_text()),
                &generation_id,
            );
        }
    };

    let request = match payload.to_request() {
        Ok(r) => r,
        Err(e) => return pipeline_failure(&e, &generation_id),
    };
    let options = match payload.apply_validation_config(state.config.generation_options()) {
        Ok(o) => o,
        Err(e) => return pipeline_failure(&e, &generation_id),
    };

    let api_key = payload
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| state.config.server_api_key());
    let Some(api_key) = api_key else {
        warn!("Generation {} rejected: no API key available", generation_id);
        return pipeline_failure(&PipelineError::MissingApiKey, &generation_id);
    };
    let provider = match state.providers.build(&api_key) {
        Ok(p) => p,
        Err(e) => {
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                &e.to_string(),
                &generation_id,
            );
        }
    };

    info!(
        "Generation {} accepted: {} slides, type={}, stream={}",
        generation_id,
        request.slide_count,
        request.presentation_type.as_str(),
        payload.stream_progress
    );
    let profile = ModelProfile::for_model(&state.model);

    if payload.stream_progress {
        return stream_generation(provider, profile, request, options, generation_id);
    }

    let ctx = GenerationContext::new(&generation_id);
    let result = IterativeOrchestrator::new(provider, profile)
        .generate_presentation(&request, &options, &ctx)
        .await;
    let (status, body) = result_body(&result);
    (status, Json(body)).into_response()
}

fn progress_event(progress: &GenerationProgress) -> Event {
    Event::default()
        .event("progress")
        .data(serde_json::to_string(progress).unwrap_or_default())
}

/// Runs the pipeline on a task and forwards progress as SSE. A closed client
/// connection cancels the run at its next checkpoint.
fn stream_generation(
    provider: Arc<dyn LlmProvider>,
    profile: ModelProfile,
    request: PresentationRequest,
    options: GenerationOptions,
    generation_id: String,
) -> Response {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Event>();
    let cancel = CancellationToken::new();

    let progress_tx = tx.clone();
    let progress_cancel = cancel.clone();
    let ctx = GenerationContext::new(&generation_id)
        .with_cancellation(cancel)
        .with_progress(Arc::new(move |p: &GenerationProgress| {
            if progress_tx.send(progress_event(p)).is_err() {
                progress_cancel.cancel();
            }
        }));

    tokio::spawn(async move {
        let result = IterativeOrchestrator::new(provider, profile)
            .generate_presentation(&request, &options, &ctx)
            .await;
        let (_, body) = result_body(&result);
        let name = if result.success { "complete" } else { "error" };
        if tx
            .send(Event::default().event(name).data(body.to_string()))
            .is_err()
        {
            info!(
                "Generation {} finished after the client disconnected",
                result.generation_id
            );
        }
    });

    let stream = UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>);
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: Value) -> GenerateRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn slide_count_accepts_integer_strings_and_numbers() {
        let as_text = body(json!({
            "prompt": "Migrate billing",
            "presentation_type": "technical",
            "slide_count": " 7 "
        }));
        assert_eq!(as_text.to_request().unwrap().slide_count, 7);

        let as_number = body(json!({
            "prompt": "Migrate billing",
            "presentationType": "process",
            "slideCount": 4,
            "tone": "executive"
        }));
        let request = as_number.to_request().unwrap();
        assert_eq!(request.slide_count, 4);
        assert_eq!(request.tone, Tone::Executive);
        assert_eq!(request.presentation_type, PresentationType::Process);
    }

    #[test]
    fn invalid_fields_are_request_errors() {
        let cases = [
            json!({"prompt": "x", "slide_count": "5"}),
            json!({"prompt": "x", "presentation_type": "keynote", "slide_count": "5"}),
            json!({"prompt": "x", "presentation_type": "business", "slide_count": "five"}),
            json!({"prompt": "x", "presentation_type": "business", "slide_count": -2}),
            json!({"prompt": "x", "presentation_type": "business", "slide_count": 31}),
            json!({"prompt": "  ", "presentation_type": "business", "slide_count": 5}),
            json!({"prompt": "x", "presentation_type": "business", "slide_count": 5, "tone": "loud"}),
        ];
        for case in cases {
            let err = body(case.clone()).to_request().unwrap_err();
            assert_eq!(err.http_status(), 400, "{case}");
        }
    }

    #[test]
    fn validation_config_overrides_refinement() {
        let req = body(json!({
            "prompt": "x",
            "presentation_type": "business",
            "slide_count": 5,
            "validationConfig": {"targetQualityScore": 90, "maxRefinementRounds": 1}
        }));
        let options = GenerationOptions {
            refinement: None,
            ..GenerationOptions::default()
        };
        let refinement = req.apply_validation_config(options).unwrap().refinement.unwrap();
        assert_eq!(refinement.target_quality_score, 90.0);
        assert_eq!(refinement.max_refinement_rounds, 1);
        assert_eq!(refinement.minimum_improvement, 2.0);

        let too_many = body(json!({
            "prompt": "x",
            "presentation_type": "business",
            "slide_count": 5,
            "validationConfig": {"maxRefinementRounds": 50}
        }));
        assert!(
            too_many
                .apply_validation_config(GenerationOptions::default())
                .is_err()
        );
    }

    #[test]
    fn failed_results_keep_upstream_status() {
        let result = IterativeGenerationResult {
            success: false,
            generation_id: "g-1".to_string(),
            presentation: None,
            outline: None,
            validation_results: None,
            processing_time_ms: 3,
            debug_info: Default::default(),
            errors: vec!["Anthropic returned 529".to_string()],
            error_status: Some(529),
        };
        let (status, body) = result_body(&result);
        assert_eq!(status.as_u16(), 529);
        assert_eq!(body["success"], false);
        assert_eq!(body["generation_id"], "g-1");
        assert!(body.get("presentation").is_none());
    }
}
