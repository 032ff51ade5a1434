//! Outline and slide scoring. Validation is advisory: nothing here returns an
//! error, a failed rubric call degrades to the neutral score.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::core::deck::{
    PresentationData, PresentationOutline, PresentationRequest, Slide, SlideContent, SlideType,
};
use crate::core::llm::{LlmProvider, ModelConfig};

use super::context::GenerationContext;
use super::repair::parse_with_repair;
use super::slide::FALLBACK_CALLOUT;
use super::types::{
    FeedbackSource, Impact, Severity, ValidationFeedback, ValidationIssue, aggregate_score,
};

const MAX_TITLE_CHARS: usize = 80;
const MAX_BULLET_CHARS: usize = 160;
const RULES_WEIGHT: f64 = 0.4;
const RUBRIC_WEIGHT: f64 = 0.6;

/// Scores for a whole deck: the outline, each slide in order, and the
/// aggregate used for reporting and refinement.
#[derive(Debug, Clone)]
pub struct PresentationScore {
    pub outline: ValidationFeedback,
    pub slides: Vec<ValidationFeedback>,
    pub overall: u8,
}

impl PresentationScore {
    pub fn new(outline: ValidationFeedback, slides: Vec<ValidationFeedback>) -> Self {
        let slide_scores: Vec<u8> = slides.iter().map(|f| f.score).collect();
        let overall = aggregate_score(Some(outline.score), &slide_scores).unwrap_or(outline.score);
        Self {
            outline,
            slides,
            overall,
        }
    }
}

#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate_outline(
        &self,
        outline: &PresentationOutline,
        request: &PresentationRequest,
        ctx: &GenerationContext,
    ) -> ValidationFeedback;

    async fn validate_slide(&self, slide: &Slide, ctx: &GenerationContext) -> ValidationFeedback;

    async fn validate_presentation(
        &self,
        deck: &PresentationData,
        outline: &PresentationOutline,
        request: &PresentationRequest,
        ctx: &GenerationContext,
    ) -> PresentationScore {
        let outline_feedback = self.validate_outline(outline, request, ctx).await;
        let mut slides = Vec::with_capacity(deck.slides.len());
        for slide in &deck.slides {
            slides.push(self.validate_slide(slide, ctx).await);
        }
        PresentationScore::new(outline_feedback, slides)
    }
}

fn score_from(issues: &[ValidationIssue]) -> u8 {
    let penalty: u32 = issues.iter().map(|i| i.severity.penalty()).sum();
    100u32.saturating_sub(penalty) as u8
}

pub fn outline_rules(outline: &PresentationOutline, request: &PresentationRequest) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if outline.title.trim().is_empty() {
        issues.push(ValidationIssue::new(Severity::Critical, "structure", "outline has no title"));
    }
    if outline.slides.len() != request.slide_count {
        issues.push(ValidationIssue::new(
            Severity::Critical,
            "structure",
            format!(
                "outline has {} slides but {} were requested",
                outline.slides.len(),
                request.slide_count
            ),
        ));
    }
    if !outline.numbering_is_contiguous() {
        issues.push(ValidationIssue::new(Severity::High, "structure", "slide numbers are not contiguous"));
    }

    let mut seen = HashSet::new();
    for entry in &outline.slides {
        let n = entry.number;
        if entry.purpose.trim().is_empty() {
            issues.push(ValidationIssue::new(Severity::Medium, "content", format!("slide {} has no purpose", n)));
        }
        if !(2..=5).contains(&entry.key_points.len()) {
            issues.push(ValidationIssue::new(
                Severity::Low,
                "content",
                format!("slide {} has {} key points (expected 2-5)", n, entry.key_points.len()),
            ));
        }
        if entry.title.chars().count() > MAX_TITLE_CHARS {
            issues.push(ValidationIssue::new(Severity::Low, "clarity", format!("slide {} title is too long", n)));
        }
        if !seen.insert(entry.title.trim().to_lowercase()) {
            issues.push(ValidationIssue::new(
                Severity::Medium,
                "flow",
                format!("slide {} repeats the title '{}'", n, entry.title),
            ));
        }
    }

    if outline.slides.first().is_some_and(|s| s.slide_type != SlideType::Title) {
        issues.push(ValidationIssue::new(Severity::Low, "flow", "deck does not open with a title slide"));
    }
    if outline.slides.last().is_some_and(|s| s.slide_type != SlideType::Conclusion) {
        issues.push(ValidationIssue::new(Severity::Low, "flow", "deck does not close with a conclusion"));
    }
    issues
}

fn bullet_issues(slide: &Slide, bullets: &[String], min: usize, issues: &mut Vec<ValidationIssue>) {
    if bullets.len() < min || bullets.len() > 7 {
        issues.push(ValidationIssue::new(
            Severity::Medium,
            "content",
            format!("'{}' has {} bullet points (expected {}-7)", slide.title, bullets.len(), min),
        ));
    }
    if bullets.iter().any(|b| b.chars().count() > MAX_BULLET_CHARS) {
        issues.push(ValidationIssue::new(Severity::Low, "clarity", "a bullet point is too long to read on a slide"));
    }
}

pub fn slide_rules(slide: &Slide) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let title_len = slide.title.trim().chars().count();
    if title_len == 0 {
        issues.push(ValidationIssue::new(Severity::Critical, "structure", "slide has no title"));
    } else if title_len > MAX_TITLE_CHARS {
        issues.push(ValidationIssue::new(Severity::Low, "clarity", "slide title is too long"));
    }
    if let Err(e) = slide.body.check() {
        issues.push(ValidationIssue::new(Severity::High, "structure", e.to_string()));
    }

    match &slide.body {
        SlideContent::TitleOnly(_) => {}
        SlideContent::TitleContent(c) => {
            if c.callout.as_deref() == Some(FALLBACK_CALLOUT) {
                issues.push(ValidationIssue::new(Severity::High, "content", "slide holds placeholder content"));
            }
            if !c.bullet_points.is_empty() {
                bullet_issues(slide, &c.bullet_points, 1, &mut issues);
            }
        }
        SlideContent::BulletList(c) => bullet_issues(slide, &c.bullet_points, 2, &mut issues),
        SlideContent::TwoColumn(c) => {
            if c.left.title.trim().is_empty() || c.right.title.trim().is_empty() {
                issues.push(ValidationIssue::new(Severity::Low, "clarity", "a column has no heading"));
            }
        }
        SlideContent::Centered(c) => {
            if c.statement.chars().count() > 200 {
                issues.push(ValidationIssue::new(Severity::Low, "clarity", "centered statement is too long"));
            }
        }
        SlideContent::Diagram(c) | SlideContent::Diamond(c) => {
            if c.sections.len() < 2 {
                issues.push(ValidationIssue::new(Severity::Medium, "content", "diagram needs at least two sections"));
            }
            if c.sections.iter().any(|s| s.description.trim().is_empty()) {
                issues.push(ValidationIssue::new(Severity::Low, "content", "a section has no description"));
            }
        }
        SlideContent::Metrics(c) => {
            if c.metrics.len() > 6 {
                issues.push(ValidationIssue::new(Severity::Low, "clarity", "too many metrics for one slide"));
            }
        }
        SlideContent::Chart(c) => {
            if c.chart.title.as_deref().is_none_or(|t| t.trim().is_empty()) {
                issues.push(ValidationIssue::new(Severity::Low, "clarity", "chart has no title"));
            }
        }
        SlideContent::Circle(c) => {
            if c.items.len() < 3 {
                issues.push(ValidationIssue::new(Severity::Low, "content", "circle layout needs at least three items"));
            }
        }
        SlideContent::Table(c) => {
            if c.table.rows.len() > 10 {
                issues.push(ValidationIssue::new(Severity::Low, "clarity", "table has more than ten rows"));
            }
            let cells: Vec<&String> = c.table.rows.iter().flatten().collect();
            let empty = cells.iter().filter(|c| c.trim().is_empty()).count();
            if !cells.is_empty() && empty * 2 > cells.len() {
                issues.push(ValidationIssue::new(Severity::Medium, "content", "most table cells are empty"));
            }
        }
        SlideContent::Timeline(c) => {
            if c.events.len() < 2 {
                issues.push(ValidationIssue::new(Severity::Medium, "content", "timeline needs at least two events"));
            }
        }
    }

    if slide.metadata.speaker_notes.trim().is_empty() {
        issues.push(ValidationIssue::new(Severity::Low, "delivery", "no speaker notes"));
    }
    issues
}

/// Deterministic rules blended with an optional LLM rubric call.
pub struct QualityValidator {
    rubric: Option<(Arc<dyn LlmProvider>, ModelConfig)>,
}

impl QualityValidator {
    pub fn rules_only() -> Self {
        Self { rubric: None }
    }

    pub fn with_rubric(provider: Arc<dyn LlmProvider>, model: ModelConfig) -> Self {
        Self {
            rubric: Some((provider, model)),
        }
    }

    async fn blend(
        &self,
        kind: &str,
        rule_issues: Vec<ValidationIssue>,
        prompt: impl FnOnce() -> String,
        ctx: &GenerationContext,
    ) -> ValidationFeedback {
        let rules_score = score_from(&rule_issues);
        let Some((provider, model)) = &self.rubric else {
            return ValidationFeedback {
                score: rules_score,
                issues: rule_issues,
                source: FeedbackSource::Rules,
            };
        };

        match rubric_call(provider.as_ref(), model, prompt(), ctx).await {
            Ok((rubric_score, mut rubric_issues)) => {
                let score = (RULES_WEIGHT * rules_score as f64 + RUBRIC_WEIGHT * rubric_score as f64)
                    .round()
                    .clamp(0.0, 100.0) as u8;
                debug!(
                    "{} review: rules {} rubric {} -> {}",
                    kind, rules_score, rubric_score, score
                );
                let mut issues = rule_issues;
                issues.append(&mut rubric_issues);
                ValidationFeedback {
                    score,
                    issues,
                    source: FeedbackSource::Blended,
                }
            }
            Err(reason) => {
                ctx.record_fallback(
                    "validator",
                    format!("{} rubric failed: {}", kind, reason),
                    "neutral_score",
                    Impact::Low,
                    None,
                );
                ValidationFeedback {
                    score: ValidationFeedback::NEUTRAL_SCORE,
                    issues: rule_issues,
                    source: FeedbackSource::Neutral,
                }
            }
        }
    }
}

async fn rubric_call(
    provider: &dyn LlmProvider,
    model: &ModelConfig,
    prompt: String,
    ctx: &GenerationContext,
) -> Result<(u8, Vec<ValidationIssue>), String> {
    let req = model.request(None, prompt);
    let completion = ctx
        .complete_with(provider, &req)
        .await
        .map_err(|e| e.to_string())?;
    let repaired = parse_with_repair(&completion.text, &|v: &Value| {
        v.get("score").is_some_and(Value::is_number)
    })
    .map_err(|e| e.to_string())?;
    let value = repaired.value;
    let score = value
        .get("score")
        .and_then(Value::as_f64)
        .ok_or("rubric score is not a number")?;
    let issues = value
        .get("issues")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let description = item.get("description").and_then(Value::as_str)?;
                    Some(ValidationIssue::new(
                        Severity::parse(item.get("severity").and_then(Value::as_str).unwrap_or("medium")),
                        item.get("category").and_then(Value::as_str).unwrap_or("quality"),
                        description,
                    ))
                })
                .collect()
        })
        .unwrap_or_default();
    Ok((score.round().clamp(0.0, 100.0) as u8, issues))
}

const RUBRIC_FORMAT: &str = "Respond with JSON only, no markdown:\n\
{\"score\": <0-100>, \"issues\": [{\"severity\": \"low|medium|high|critical\", \"category\": \"...\", \"description\": \"...\"}]}";

#[async_trait]
impl Validator for QualityValidator {
    async fn validate_outline(
        &self,
        outline: &PresentationOutline,
        request: &PresentationRequest,
        ctx: &GenerationContext,
    ) -> ValidationFeedback {
        let issues = outline_rules(outline, request);
        self.blend(
            "outline",
            issues,
            || {
                let entries = outline
                    .slides
                    .iter()
                    .map(|s| format!("{}. [{}] {} - {}", s.number, s.slide_type.as_str(), s.title, s.purpose))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "TASK: OUTLINE REVIEW\n\nREQUEST: {}\nAUDIENCE: {}\nFRAMEWORK: {}\n\nOUTLINE: {}\n{}\n\n\
                     Score narrative flow, coverage of the request and fit for the audience.\n{}",
                    request.prompt,
                    request.audience_or_default(),
                    outline.metadata.framework,
                    outline.title,
                    entries,
                    RUBRIC_FORMAT
                )
            },
            ctx,
        )
        .await
    }

    async fn validate_slide(&self, slide: &Slide, ctx: &GenerationContext) -> ValidationFeedback {
        let issues = slide_rules(slide);
        self.blend(
            "slide",
            issues,
            || {
                format!(
                    "TASK: SLIDE REVIEW\n\nSLIDE:\n{}\n\n\
                     Score clarity, concision and how well the content supports the title.\n{}",
                    serde_json::to_string(slide).unwrap_or_default(),
                    RUBRIC_FORMAT
                )
            },
            ctx,
        )
        .await
    }
}
