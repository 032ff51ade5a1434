use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::deck::{DeckMetadata, PresentationOutline, PresentationRequest, SlideOutline, SlideType};
use crate::core::llm::{LlmProvider, ModelConfig};

use super::context::GenerationContext;
use super::error::PipelineError;
use super::framework::FrameworkSelection;
use super::repair::{RepairStrategy, has_slides_array, parse_with_repair};
use super::retry::RetryPolicy;
use super::types::Impact;

pub const MAX_KEY_POINTS: usize = 6;

pub struct OutlineGenerator {
    provider: Arc<dyn LlmProvider>,
    model: ModelConfig,
    retry: RetryPolicy,
}

impl OutlineGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, model: ModelConfig, retry: RetryPolicy) -> Self {
        Self {
            provider,
            model,
            retry,
        }
    }

    /// Generates and structurally validates the outline, retrying upstream
    /// and parse failures under the configured policy.
    pub async fn generate_outline(
        &self,
        request: &PresentationRequest,
        selection: &FrameworkSelection,
        ctx: &GenerationContext,
    ) -> Result<PresentationOutline, PipelineError> {
        let prompt = outline_prompt(request, selection);
        let mut last_err = PipelineError::MalformedOutline("no attempt was made".to_string());

        for attempt in 0..self.retry.attempts() {
            if attempt > 0 {
                ctx.check_cancelled()?;
                warn!(
                    "Outline attempt {} failed ({}); retrying",
                    attempt, last_err
                );
                self.retry.wait(attempt).await;
            }
            match self.attempt(&prompt, request, selection, ctx).await {
                Ok(outline) => {
                    info!(
                        "Outline ready: '{}' with {} slides (~{} tokens)",
                        outline.title,
                        outline.slides.len(),
                        outline.metadata.total_estimated_tokens
                    );
                    return Ok(outline);
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    async fn attempt(
        &self,
        prompt: &str,
        request: &PresentationRequest,
        selection: &FrameworkSelection,
        ctx: &GenerationContext,
    ) -> Result<PresentationOutline, PipelineError> {
        let req = self.model.request(None, prompt.to_string());
        let completion = ctx.complete_with(self.provider.as_ref(), &req).await?;
        let repaired = parse_with_repair(&completion.text, &has_slides_array)
            .map_err(|e| PipelineError::MalformedOutline(e.to_string()))?;
        if repaired.strategy != RepairStrategy::Direct {
            ctx.record_fallback(
                "outline_generator",
                format!("outline JSON needed {} repair", repaired.strategy.as_str()),
                repaired.strategy.as_str(),
                Impact::Low,
                None,
            );
        }
        build_outline(&repaired.value, request, selection).map_err(PipelineError::MalformedOutline)
    }
}

fn outline_prompt(request: &PresentationRequest, selection: &FrameworkSelection) -> String {
    let steps = selection
        .framework
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {}: {}", i + 1, s.label, s.description))
        .collect::<Vec<_>>()
        .join("\n");
    let types = SlideType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "TASK: PRESENTATION OUTLINE\n\n\
         TOPIC: {topic}\n\
         PRESENTATION TYPE: {ptype}\n\
         AUDIENCE: {audience}\n\
         TONE: {tone}\n\
         SLIDE COUNT: exactly {count}\n\n\
         Follow the {name} framework:\n{steps}\n\n\
         Plan the deck only; do not write full slide content. The first slide \
         should be of type \"title\" and the last of type \"conclusion\".\n\
         Allowed slide types: {types}.\n\n\
         Return a single JSON object with this shape:\n\
         {{\n  \"title\": \"...\",\n  \"subtitle\": \"...\",\n  \"description\": \"...\",\n  \
         \"metadata\": {{\"author\": \"...\", \"estimatedDuration\": <minutes>}},\n  \
         \"slides\": [\n    {{\"title\": \"...\", \"type\": \"<slide type>\", \"purpose\": \"one line\", \
         \"keyPoints\": [\"2-5 short points\"]}}\n  ]\n}}\n\n\
         The slides array must contain exactly {count} entries.\n\
         Respond with JSON only, no markdown.",
        topic = request.prompt,
        ptype = request.presentation_type.as_str(),
        audience = request.audience_or_default(),
        tone = request.tone.as_str(),
        count = request.slide_count,
        name = selection.framework.name,
        steps = steps,
        types = types,
    )
}

fn required_str<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn optional_str(value: &Value, key: &str) -> Option<String> {
    required_str(value, key).map(str::to_string)
}

fn key_points(entry: &Value) -> Vec<String> {
    ["keyPoints", "key_points", "points"]
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .take(MAX_KEY_POINTS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Structural check of a parsed outline document. A syntactically valid
/// document with the wrong shape is rejected like a parse failure.
pub fn build_outline(
    value: &Value,
    request: &PresentationRequest,
    selection: &FrameworkSelection,
) -> Result<PresentationOutline, String> {
    let title = required_str(value, "title").ok_or("outline has no title")?;
    let meta = value
        .get("metadata")
        .filter(|m| m.is_object())
        .ok_or("outline has no metadata object")?;
    let entries = value
        .get("slides")
        .and_then(Value::as_array)
        .ok_or("outline has no slides array")?;
    if entries.len() != request.slide_count {
        return Err(format!(
            "expected {} slides, got {}",
            request.slide_count,
            entries.len()
        ));
    }

    let mut slides = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let number = i + 1;
        let field = |key: &str| {
            required_str(entry, key)
                .map(str::to_string)
                .ok_or_else(|| format!("slide {} has no {}", number, key))
        };
        slides.push(SlideOutline {
            number,
            slide_type: SlideType::parse(&field("type")?),
            title: field("title")?,
            purpose: field("purpose")?,
            key_points: key_points(entry),
            estimated_tokens: 0,
        });
    }

    let estimated_duration_minutes = meta
        .get("estimatedDuration")
        .and_then(Value::as_u64)
        .map(|m| m as u32)
        .unwrap_or_else(|| (slides.len() as u32 * 3).div_ceil(2));

    let mut outline = PresentationOutline {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        subtitle: optional_str(value, "subtitle"),
        description: optional_str(value, "description"),
        metadata: DeckMetadata {
            author: optional_str(meta, "author").unwrap_or_else(|| "slidesmith".to_string()),
            created_at: Utc::now(),
            presentation_type: request.presentation_type,
            audience: request.audience.clone(),
            tone: request.tone,
            framework: selection.framework.id.to_string(),
            estimated_slides: slides.len(),
            estimated_duration_minutes,
            total_estimated_tokens: 0,
        },
        slides,
    };
    outline.annotate_token_estimates();
    Ok(outline)
}
