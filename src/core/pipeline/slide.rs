use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::deck::{
    BulletListContent, Layout, PresentationOutline, Slide, SlideContent, SlideMetadata,
    SlideOutline, SlideType, TitleContentBody,
};
use crate::core::llm::{LlmError, LlmProvider, ModelConfig};

use super::context::GenerationContext;
use super::repair::{direct, heuristic, strip_markdown};
use super::retry::RetryPolicy;
use super::types::{Impact, ValidationFeedback};

pub const FALLBACK_CALLOUT: &str = "Generation failed: this slide needs manual content.";

#[derive(Debug, Clone, thiserror::Error)]
pub enum SlideError {
    #[error(transparent)]
    Upstream(#[from] LlmError),
    #[error("slide response is not usable JSON: {0}")]
    Unparseable(String),
}

#[derive(Debug, Clone)]
pub struct SlideGeneration {
    pub slide: Slide,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub retry_count: u32,
    pub fallback: bool,
}

/// Expands outline entries into slides, one call at a time. Holds the slides
/// accepted so far in this run so later prompts can see a short window of
/// what came before.
pub struct SlideGenerator {
    provider: Arc<dyn LlmProvider>,
    model: ModelConfig,
    retry: RetryPolicy,
    context_window: usize,
    cache: Vec<Slide>,
}

impl SlideGenerator {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: ModelConfig,
        retry: RetryPolicy,
        context_window: usize,
    ) -> Self {
        Self {
            provider,
            model,
            retry,
            context_window,
            cache: Vec::new(),
        }
    }

    pub fn commit(&mut self, slide: Slide) {
        self.cache.push(slide);
    }

    /// Swaps an already committed slide after a revision.
    pub fn replace(&mut self, number: usize, slide: Slide) {
        if let Some(existing) = number.checked_sub(1).and_then(|i| self.cache.get_mut(i)) {
            *existing = slide;
        }
    }

    pub fn reset(&mut self) {
        self.cache.clear();
    }

    pub fn cached(&self) -> &[Slide] {
        &self.cache
    }

    /// Slides preceding `number`, at most `context_window` of them.
    fn window(&self, number: usize) -> &[Slide] {
        let before = number.saturating_sub(1).min(self.cache.len());
        let start = before.saturating_sub(self.context_window);
        &self.cache[start..before]
    }

    /// Always yields a slide: on exhausted retries the deterministic
    /// fallback slide is returned and a fallback event recorded.
    pub async fn generate_slide(
        &self,
        entry: &SlideOutline,
        outline: &PresentationOutline,
        ctx: &GenerationContext,
    ) -> SlideGeneration {
        let started = Instant::now();
        let tokens_before = ctx.tokens_used();
        let prompt = self.slide_prompt(entry, outline, None);
        let mut last_error = String::new();

        for attempt in 0..self.retry.attempts() {
            if attempt > 0 {
                warn!(
                    "Slide {} attempt {} failed: {}; retrying",
                    entry.number, attempt, last_error
                );
                self.retry.wait(attempt).await;
            }
            if ctx.is_cancelled() {
                last_error = "cancelled".to_string();
                break;
            }
            match self.attempt(&prompt, entry, ctx).await {
                Ok(slide) => {
                    debug!("Slide {} generated ({})", entry.number, slide.layout().as_str());
                    return SlideGeneration {
                        slide,
                        tokens_used: ctx.tokens_used().saturating_sub(tokens_before),
                        duration_ms: started.elapsed().as_millis() as u64,
                        retry_count: attempt,
                        fallback: false,
                    };
                }
                Err(e) => last_error = e.to_string(),
            }
        }

        ctx.record_fallback(
            "slide_generator",
            format!(
                "slide {} failed after {} attempts: {}",
                entry.number,
                self.retry.attempts(),
                last_error
            ),
            "fallback_slide",
            Impact::Medium,
            Some(entry.number),
        );
        SlideGeneration {
            slide: create_fallback_slide(entry),
            tokens_used: ctx.tokens_used().saturating_sub(tokens_before),
            duration_ms: started.elapsed().as_millis() as u64,
            retry_count: self.retry.max_retries,
            fallback: true,
        }
    }

    /// Regenerates a slide with reviewer feedback in the prompt. Unlike
    /// [`generate_slide`](Self::generate_slide) a failure is returned so the
    /// caller can keep the previous version.
    pub async fn revise_slide(
        &self,
        entry: &SlideOutline,
        outline: &PresentationOutline,
        current: &Slide,
        feedback: &ValidationFeedback,
        ctx: &GenerationContext,
    ) -> Result<SlideGeneration, SlideError> {
        let started = Instant::now();
        let tokens_before = ctx.tokens_used();
        let prompt = self.slide_prompt(entry, outline, Some((current, feedback)));
        let mut last_error = SlideError::Unparseable("no attempt was made".to_string());

        for attempt in 0..self.retry.attempts() {
            if attempt > 0 {
                self.retry.wait(attempt).await;
            }
            match self.attempt(&prompt, entry, ctx).await {
                Ok(slide) => {
                    return Ok(SlideGeneration {
                        slide,
                        tokens_used: ctx.tokens_used().saturating_sub(tokens_before),
                        duration_ms: started.elapsed().as_millis() as u64,
                        retry_count: attempt,
                        fallback: false,
                    });
                }
                Err(e) => {
                    warn!("Revision of slide {} failed: {}", entry.number, e);
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }

    async fn attempt(
        &self,
        prompt: &str,
        entry: &SlideOutline,
        ctx: &GenerationContext,
    ) -> Result<Slide, SlideError> {
        let req = self.model.request(None, prompt.to_string());
        let completion = ctx.complete_with(self.provider.as_ref(), &req).await?;
        let value = parse_slide_value(&completion.text).map_err(SlideError::Unparseable)?;
        Ok(materialize(&value, entry, ctx))
    }

    fn slide_prompt(
        &self,
        entry: &SlideOutline,
        outline: &PresentationOutline,
        revision: Option<(&Slide, &ValidationFeedback)>,
    ) -> String {
        let mut prompt = format!(
            "TASK: SINGLE SLIDE\n\
             SLIDE NUMBER: {} of {}\n\
             PRESENTATION: {}\n\
             FRAMEWORK: {}\n\
             AUDIENCE: {}\n\
             TONE: {}\n\n\
             SLIDE OUTLINE:\n- type: {}\n- title: {}\n- purpose: {}\n- key points: {}\n",
            entry.number,
            outline.slides.len(),
            outline.title,
            outline.metadata.framework,
            outline
                .metadata
                .audience
                .as_deref()
                .unwrap_or("general business audience"),
            outline.metadata.tone.as_str(),
            entry.slide_type.as_str(),
            entry.title,
            entry.purpose,
            entry.key_points.join("; "),
        );

        let window = self.window(entry.number);
        if !window.is_empty() {
            prompt.push_str("\nPREVIOUS SLIDES (keep the narrative consistent):\n");
            let first = entry.number - window.len();
            for (i, slide) in window.iter().enumerate() {
                let summary = slide.body.text_fragments().into_iter().take(3).collect::<Vec<_>>();
                prompt.push_str(&format!(
                    "- Slide {}: {} [{}] {}\n",
                    first + i,
                    slide.title,
                    slide.layout().as_str(),
                    summary.join("; ")
                ));
            }
        }

        prompt.push_str(&format!(
            "\nSuggested layout: {}. Content schema per layout:\n",
            entry.slide_type.default_layout().as_str()
        ));
        for layout in Layout::ALL {
            prompt.push_str(&format!("- {}: {}\n", layout.as_str(), layout_schema(layout)));
        }

        if let Some((current, feedback)) = revision {
            let current_json = serde_json::to_string(current).unwrap_or_default();
            prompt.push_str(&format!(
                "\nCURRENT VERSION:\n{}\n\nREVISION FEEDBACK (score {}):\n{}\nRewrite the slide to address every point.\n",
                current_json,
                feedback.score,
                feedback.as_prompt_lines()
            ));
        }

        prompt.push_str(
            "\nReturn a single JSON object:\n\
             {\"id\": \"...\", \"type\": \"<slide type>\", \"title\": \"...\", \"subtitle\": \"...\", \
             \"layout\": \"<layout>\", \"content\": {...}, \
             \"metadata\": {\"speakerNotes\": \"...\", \"estimatedDurationSeconds\": 90, \"audienceLevel\": \"intermediate\"}}\n\
             Respond with JSON only, no markdown.",
        );
        prompt
    }
}

fn layout_schema(layout: Layout) -> &'static str {
    match layout {
        Layout::TitleOnly => r#"{"tagline": "..."}"#,
        Layout::TitleContent => r#"{"body": "...", "bulletPoints": ["..."], "callout": "..."}"#,
        Layout::TwoColumn => {
            r#"{"left": {"title": "...", "items": ["..."]}, "right": {"title": "...", "items": ["..."]}}"#
        }
        Layout::BulletList => r#"{"bulletPoints": ["3-6 concise points"]}"#,
        Layout::Centered => r#"{"statement": "...", "supporting": "..."}"#,
        Layout::Diagram | Layout::Diamond => {
            r#"{"sections": [{"title": "...", "description": "...", "items": ["..."]}]}"#
        }
        Layout::Metrics => {
            r#"{"metrics": [{"label": "...", "value": "...", "trend": "up|down|flat", "description": "..."}]}"#
        }
        Layout::Chart => {
            r#"{"chart": {"chartType": "bar|line|pie|area", "title": "...", "labels": ["..."], "series": [{"name": "...", "values": [1.0]}]}}"#
        }
        Layout::Circle => r#"{"center": "...", "items": ["..."]}"#,
        Layout::Table => r#"{"table": {"headers": ["..."], "rows": [["one cell per header"]]}}"#,
        Layout::Timeline => {
            r#"{"events": [{"date": "...", "title": "...", "description": "...", "status": "completed|in-progress|planned"}]}"#
        }
    }
}

/// Strips fences, parses (leniently on a second try) and unwraps an array
/// or `{"slides": [...]}` envelope to its first element.
pub fn parse_slide_value(text: &str) -> Result<Value, String> {
    let body = strip_markdown(text);
    let value = direct(body).or_else(|e| heuristic(body).map_err(|_| e))?;
    unwrap_envelope(value)
}

fn unwrap_envelope(value: Value) -> Result<Value, String> {
    let inner = match value {
        Value::Array(items) => items.into_iter().next(),
        Value::Object(mut map) => match map.remove("slides") {
            Some(Value::Array(items)) => items.into_iter().next(),
            Some(other) => {
                map.insert("slides".to_string(), other);
                Some(Value::Object(map))
            }
            None => match map.remove("slide") {
                Some(slide @ Value::Object(_)) => Some(slide),
                Some(other) => {
                    map.insert("slide".to_string(), other);
                    Some(Value::Object(map))
                }
                None => Some(Value::Object(map)),
            },
        },
        _ => None,
    };
    inner
        .filter(Value::is_object)
        .ok_or_else(|| "response holds no slide object".to_string())
}

fn non_empty(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_list(value: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|k| value.get(*k).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds a complete slide from whatever the model returned, filling every
/// missing field from the outline entry.
fn materialize(value: &Value, entry: &SlideOutline, ctx: &GenerationContext) -> Slide {
    let slide_type = non_empty(value, "type")
        .map(|t| SlideType::parse(&t))
        .unwrap_or(entry.slide_type);
    let layout = non_empty(value, "layout")
        .and_then(|l| Layout::parse(&l))
        .unwrap_or_else(|| entry.slide_type.default_layout());
    let content_value = value
        .get("content")
        .filter(|c| c.is_object())
        .unwrap_or(value);

    let body = match SlideContent::from_value(layout, content_value) {
        Ok(body) => body,
        Err(e) => {
            let mut bullets = string_list(
                content_value,
                &["bulletPoints", "bullets", "points", "items"],
            );
            if bullets.is_empty() {
                bullets = entry.key_points.clone();
            }
            if bullets.is_empty() {
                bullets.push(entry.purpose.clone());
            }
            ctx.record_fallback(
                "slide_generator",
                e.to_string(),
                "bullet_list_coercion",
                Impact::Low,
                Some(entry.number),
            );
            SlideContent::BulletList(BulletListContent {
                bullet_points: bullets,
            })
        }
    };

    let mut metadata: SlideMetadata = value
        .get("metadata")
        .filter(|m| m.is_object())
        .and_then(|m| serde_json::from_value(m.clone()).ok())
        .unwrap_or_default();
    if metadata.speaker_notes.trim().is_empty() {
        metadata.speaker_notes =
            non_empty(value, "speakerNotes").unwrap_or_else(|| entry.purpose.clone());
    }

    Slide {
        id: non_empty(value, "id").unwrap_or_else(|| format!("slide-{}", entry.number)),
        slide_type,
        title: non_empty(value, "title").unwrap_or_else(|| fallback_title(entry)),
        subtitle: non_empty(value, "subtitle"),
        body,
        metadata,
    }
}

fn fallback_title(entry: &SlideOutline) -> String {
    let title = entry.title.trim();
    if title.is_empty() {
        format!("Slide {}", entry.number)
    } else {
        title.to_string()
    }
}

/// Deterministic placeholder for a slide whose generation failed. Total:
/// every field is populated for any outline entry.
pub fn create_fallback_slide(entry: &SlideOutline) -> Slide {
    let mut bullets: Vec<String> = entry
        .key_points
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if bullets.is_empty() {
        bullets.push("Content to be added".to_string());
    }
    let purpose = entry.purpose.trim();
    Slide {
        id: format!("slide-{}", entry.number),
        slide_type: entry.slide_type,
        title: fallback_title(entry),
        subtitle: None,
        body: SlideContent::TitleContent(TitleContentBody {
            body: (!purpose.is_empty()).then(|| purpose.to_string()),
            bullet_points: bullets,
            callout: Some(FALLBACK_CALLOUT.to_string()),
        }),
        metadata: SlideMetadata {
            speaker_notes: "Automatic generation failed for this slide. Replace the placeholder content before presenting.".to_string(),
            ..SlideMetadata::default()
        },
    }
}
