use serde::{Deserialize, Serialize};

use crate::core::deck::{PresentationData, PresentationOutline};

use super::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    Outline,
    Slides,
    Validation,
    Complete,
    Failed,
    Cancelled,
}

impl GenerationPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationPhase::Outline => "outline",
            GenerationPhase::Slides => "slides",
            GenerationPhase::Validation => "validation",
            GenerationPhase::Complete => "complete",
            GenerationPhase::Failed => "failed",
            GenerationPhase::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GenerationPhase::Complete | GenerationPhase::Failed | GenerationPhase::Cancelled
        )
    }
}

/// One mid-flight signal. Append-only, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgress {
    pub phase: GenerationPhase,
    pub current_step: String,
    pub percent_complete: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_slides: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_score: Option<u8>,
}

impl GenerationProgress {
    pub fn new(phase: GenerationPhase, step: &str, percent: u8, message: impl Into<String>) -> Self {
        Self {
            phase,
            current_step: step.to_string(),
            percent_complete: percent.min(100),
            message: message.into(),
            slide_number: None,
            total_slides: None,
            validation_score: None,
        }
    }

    pub fn for_slide(mut self, number: usize, total: usize) -> Self {
        self.slide_number = Some(number);
        self.total_slides = Some(total);
        self
    }

    pub fn with_score(mut self, score: Option<u8>) -> Self {
        self.validation_score = score;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn penalty(self) -> u32 {
        match self {
            Severity::Low => 3,
            Severity::Medium => 8,
            Severity::High => 15,
            Severity::Critical => 30,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" | "major" => Severity::High,
            "low" | "minor" | "info" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: String,
    pub description: String,
}

impl ValidationIssue {
    pub fn new(severity: Severity, category: &str, description: impl Into<String>) -> Self {
        Self {
            severity,
            category: category.to_string(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackSource {
    Rules,
    Blended,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFeedback {
    pub score: u8,
    pub issues: Vec<ValidationIssue>,
    pub source: FeedbackSource,
}

impl ValidationFeedback {
    pub const NEUTRAL_SCORE: u8 = 70;

    pub fn neutral() -> Self {
        Self {
            score: Self::NEUTRAL_SCORE,
            issues: Vec::new(),
            source: FeedbackSource::Neutral,
        }
    }

    /// Feedback as bullet lines for a revision prompt.
    pub fn as_prompt_lines(&self) -> String {
        if self.issues.is_empty() {
            return "- No specific issues reported; improve clarity and impact.".to_string();
        }
        self.issues
            .iter()
            .map(|i| format!("- [{:?}/{}] {}", i.severity, i.category, i.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Low,
    Medium,
    High,
}

/// A failure that was absorbed locally and replaced by a safe default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackEvent {
    pub component: String,
    pub reason: String,
    pub method: String,
    pub impact: Impact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slide_number: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementConfig {
    pub target_quality_score: f64,
    pub max_refinement_rounds: u32,
    pub minimum_improvement: f64,
    pub max_slides_per_round: usize,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            target_quality_score: 80.0,
            max_refinement_rounds: 3,
            minimum_improvement: 2.0,
            max_slides_per_round: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameworkStrategy {
    Heuristic,
    Analytical,
}

/// Knobs for one run of the pipeline.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub framework_strategy: FrameworkStrategy,
    pub enable_validation: bool,
    pub llm_rubric: bool,
    pub min_slide_score: u8,
    pub max_quality_retries: u32,
    pub context_window: usize,
    pub outline_retry: RetryPolicy,
    pub slide_retry: RetryPolicy,
    pub refinement: Option<RefinementConfig>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            framework_strategy: FrameworkStrategy::Heuristic,
            enable_validation: true,
            llm_rubric: true,
            min_slide_score: 60,
            max_quality_retries: 1,
            context_window: 2,
            outline_retry: RetryPolicy::linear(1, std::time::Duration::from_millis(1000)),
            slide_retry: RetryPolicy::default(),
            refinement: Some(RefinementConfig::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideTiming {
    pub slide_number: usize,
    pub duration_ms: u64,
    pub retry_count: u32,
    pub quality_attempts: u32,
    pub tokens_used: u64,
    pub fallback: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub framework_selected: String,
    pub framework_confidence: f64,
    pub framework_rationale: String,
    pub framework_method: String,
    pub total_tokens: u64,
    pub llm_calls: u64,
    pub slide_timings: Vec<SlideTiming>,
    pub fallback_events: Vec<FallbackEvent>,
    pub progress_events: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementSummary {
    pub initial_score: f64,
    pub final_score: f64,
    pub total_improvement: f64,
    pub rounds: usize,
    pub target_achieved: bool,
    pub termination: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub outline_score: Option<u8>,
    pub slide_scores: Vec<u8>,
    pub overall_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinement: Option<RefinementSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterativeGenerationResult {
    pub success: bool,
    pub generation_id: String,
    pub presentation: Option<PresentationData>,
    pub outline: Option<PresentationOutline>,
    pub validation_results: Option<ValidationSummary>,
    pub processing_time_ms: u64,
    pub debug_info: DebugInfo,
    pub errors: Vec<String>,
    #[serde(skip)]
    pub error_status: Option<u16>,
}

/// `round((outline + mean(slides)) / 2)`; either side may be missing.
pub fn aggregate_score(outline: Option<u8>, slides: &[u8]) -> Option<u8> {
    let slide_mean = if slides.is_empty() {
        None
    } else {
        Some(slides.iter().map(|s| *s as f64).sum::<f64>() / slides.len() as f64)
    };
    let combined = match (outline.map(f64::from), slide_mean) {
        (Some(o), Some(s)) => (o + s) / 2.0,
        (Some(o), None) => o,
        (None, Some(s)) => s,
        (None, None) => return None,
    };
    Some(combined.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_score_averages_outline_with_slide_mean() {
        assert_eq!(aggregate_score(Some(80), &[70, 90, 60]), Some(77));
        assert_eq!(aggregate_score(Some(81), &[]), Some(81));
        assert_eq!(aggregate_score(None, &[50, 51]), Some(51));
        assert_eq!(aggregate_score(None, &[]), None);
    }

    #[test]
    fn severity_parse_defaults_to_medium() {
        assert_eq!(Severity::parse("MAJOR"), Severity::High);
        assert_eq!(Severity::parse("whatever"), Severity::Medium);
        assert!(Severity::Critical > Severity::Low);
    }
}
