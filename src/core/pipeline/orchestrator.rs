use std::sync::Arc;
use std::time::Instant;

use tracing::{Instrument, debug, info};

use crate::core::deck::{PresentationData, PresentationOutline, PresentationRequest};
use crate::core::llm::{LlmProvider, ModelProfile};

use super::context::GenerationContext;
use super::error::PipelineError;
use super::framework::{FrameworkSelection, choose_framework};
use super::outline::OutlineGenerator;
use super::refine::{RefinementEngine, RefinementError};
use super::slide::{SlideGeneration, SlideGenerator};
use super::types::{
    DebugInfo, GenerationOptions, GenerationPhase, GenerationProgress, Impact,
    IterativeGenerationResult, RefinementSummary, SlideTiming, ValidationFeedback,
    ValidationSummary, aggregate_score,
};
use super::validator::{PresentationScore, QualityValidator, Validator};
use super::can_transition;

/// Progress checkpoints. Per-slide progress is spread linearly between
/// `PCT_SLIDES_START` and `PCT_SLIDES_END`.
const PCT_START: u8 = 5;
const PCT_FRAMEWORK: u8 = 15;
const PCT_OUTLINE: u8 = 25;
const PCT_SLIDES_START: u8 = 30;
const PCT_SLIDES_END: u8 = 80;
const PCT_ASSEMBLY: u8 = 85;
const PCT_COMPLETE: u8 = 100;

pub fn slide_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return PCT_SLIDES_END;
    }
    let span = (PCT_SLIDES_END - PCT_SLIDES_START) as usize;
    (PCT_SLIDES_START as usize + span * done.min(total) / total) as u8
}

struct PhaseTracker {
    phase: GenerationPhase,
}

impl PhaseTracker {
    fn enter(&mut self, to: GenerationPhase) {
        debug_assert!(
            can_transition(self.phase, to),
            "invalid phase transition {:?} -> {:?}",
            self.phase,
            to
        );
        debug!("Phase {} -> {}", self.phase.as_str(), to.as_str());
        self.phase = to;
    }
}

/// Top-level coordinator. One instance per generation request; holds no
/// state between runs.
pub struct IterativeOrchestrator {
    provider: Arc<dyn LlmProvider>,
    profile: ModelProfile,
}

impl IterativeOrchestrator {
    pub fn new(provider: Arc<dyn LlmProvider>, profile: ModelProfile) -> Self {
        Self { provider, profile }
    }

    pub async fn generate_presentation(
        &self,
        request: &PresentationRequest,
        options: &GenerationOptions,
        ctx: &GenerationContext,
    ) -> IterativeGenerationResult {
        ctx.start(&format!(
            "{} slides, {} deck",
            request.slide_count,
            request.presentation_type.as_str()
        ));
        let mut tracker = PhaseTracker {
            phase: GenerationPhase::Outline,
        };
        let mut debug_info = DebugInfo::default();

        let outcome = self
            .run(request, options, ctx, &mut tracker, &mut debug_info)
            .instrument(ctx.span().clone())
            .await;

        debug_info.total_tokens = ctx.tokens_used();
        debug_info.llm_calls = ctx.llm_calls();
        debug_info.fallback_events = ctx.fallback_events();

        match outcome {
            Ok((presentation, outline, validation)) => {
                ctx.complete();
                debug_info.progress_events = ctx.progress_log().len();
                IterativeGenerationResult {
                    success: true,
                    generation_id: ctx.generation_id().to_string(),
                    presentation: Some(presentation),
                    outline: Some(outline),
                    validation_results: validation,
                    processing_time_ms: ctx.elapsed_ms(),
                    debug_info,
                    errors: Vec::new(),
                    error_status: None,
                }
            }
            Err(e) => {
                let terminal = match e {
                    PipelineError::Cancelled => GenerationPhase::Cancelled,
                    _ => GenerationPhase::Failed,
                };
                tracker.enter(terminal);
                let last = ctx
                    .progress_log()
                    .last()
                    .map(|p| p.percent_complete)
                    .unwrap_or(0);
                ctx.emit(GenerationProgress::new(terminal, terminal.as_str(), last, e.to_string()));
                ctx.fail(&e);
                debug_info.progress_events = ctx.progress_log().len();
                IterativeGenerationResult {
                    success: false,
                    generation_id: ctx.generation_id().to_string(),
                    presentation: None,
                    outline: None,
                    validation_results: None,
                    processing_time_ms: ctx.elapsed_ms(),
                    debug_info,
                    errors: vec![e.to_string()],
                    error_status: Some(e.http_status()),
                }
            }
        }
    }

    async fn run(
        &self,
        request: &PresentationRequest,
        options: &GenerationOptions,
        ctx: &GenerationContext,
        tracker: &mut PhaseTracker,
        debug_info: &mut DebugInfo,
    ) -> Result<(PresentationData, PresentationOutline, Option<ValidationSummary>), PipelineError>
    {
        ctx.emit(GenerationProgress::new(
            GenerationPhase::Outline,
            "start",
            PCT_START,
            "Starting presentation generation",
        ));
        ctx.check_cancelled()?;

        let selection = choose_framework(
            options.framework_strategy,
            self.provider.as_ref(),
            &self.profile.framework,
            request,
            ctx,
        )
        .await;
        record_selection(debug_info, &selection);
        ctx.emit(GenerationProgress::new(
            GenerationPhase::Outline,
            "framework",
            PCT_FRAMEWORK,
            format!("Using the {} framework", selection.framework.name),
        ));
        ctx.check_cancelled()?;

        let outline = OutlineGenerator::new(
            self.provider.clone(),
            self.profile.outline.clone(),
            options.outline_retry,
        )
        .generate_outline(request, &selection, ctx)
        .await?;
        ctx.emit(GenerationProgress::new(
            GenerationPhase::Outline,
            "outline_generated",
            PCT_OUTLINE,
            format!("Outline ready with {} slides", outline.slides.len()),
        ));

        let validator: Box<dyn Validator> = if options.llm_rubric {
            Box::new(QualityValidator::with_rubric(
                self.provider.clone(),
                self.profile.review.clone(),
            ))
        } else {
            Box::new(QualityValidator::rules_only())
        };

        let outline_feedback = if options.enable_validation {
            Some(validator.validate_outline(&outline, request, ctx).await)
        } else {
            None
        };
        ctx.emit(
            GenerationProgress::new(
                GenerationPhase::Outline,
                "outline_validated",
                PCT_SLIDES_START,
                "Outline validated",
            )
            .with_score(outline_feedback.as_ref().map(|f| f.score)),
        );
        ctx.check_cancelled()?;

        tracker.enter(GenerationPhase::Slides);
        let mut generator = SlideGenerator::new(
            self.provider.clone(),
            self.profile.slide.clone(),
            options.slide_retry,
            options.context_window,
        );
        generator.reset();
        let total = outline.slides.len();
        let mut slides = Vec::with_capacity(total);
        let mut slide_feedback = Vec::with_capacity(total);

        for (i, entry) in outline.slides.iter().enumerate() {
            ctx.check_cancelled()?;
            let started = Instant::now();
            let mut best = generator.generate_slide(entry, &outline, ctx).await;
            let mut tokens = best.tokens_used;
            let mut quality_attempts = 1;
            let mut feedback = None;

            if options.enable_validation {
                let mut current = validator.validate_slide(&best.slide, ctx).await;
                // Fallback slides are placeholders; reworking them here would
                // only repeat the failure.
                while !best.fallback
                    && current.score < options.min_slide_score
                    && quality_attempts <= options.max_quality_retries
                {
                    ctx.check_cancelled()?;
                    info!(
                        "Slide {} scored {} (< {}), reworking",
                        entry.number, current.score, options.min_slide_score
                    );
                    quality_attempts += 1;
                    let revised = match generator
                        .revise_slide(entry, &outline, &best.slide, &current, ctx)
                        .await
                    {
                        Ok(r) => r,
                        Err(e) => {
                            ctx.record_fallback(
                                "quality_gate",
                                e.to_string(),
                                "keep_best_attempt",
                                Impact::Low,
                                Some(entry.number),
                            );
                            break;
                        }
                    };
                    tokens += revised.tokens_used;
                    let revised_feedback = validator.validate_slide(&revised.slide, ctx).await;
                    if revised_feedback.score > current.score {
                        best = SlideGeneration { tokens_used: tokens, ..revised };
                        current = revised_feedback;
                    }
                }
                feedback = Some(current);
            }

            debug_info.slide_timings.push(SlideTiming {
                slide_number: entry.number,
                duration_ms: started.elapsed().as_millis() as u64,
                retry_count: best.retry_count,
                quality_attempts,
                tokens_used: tokens,
                fallback: best.fallback,
            });
            ctx.emit(
                GenerationProgress::new(
                    GenerationPhase::Slides,
                    "slide",
                    slide_percent(i + 1, total),
                    format!("Slide {} of {}: {}", entry.number, total, best.slide.title),
                )
                .for_slide(entry.number, total)
                .with_score(feedback.as_ref().map(|f| f.score)),
            );
            generator.commit(best.slide.clone());
            slides.push(best.slide);
            if let Some(f) = feedback {
                slide_feedback.push(f);
            }
        }

        ctx.check_cancelled()?;
        tracker.enter(GenerationPhase::Validation);
        let mut presentation = PresentationData::assemble(&outline, slides);

        let scores = outline_feedback.map(|fb| PresentationScore::new(fb, slide_feedback));
        let mut validation = scores.as_ref().map(|s| summary_from(s, None));
        ctx.emit(
            GenerationProgress::new(
                GenerationPhase::Validation,
                "assembly",
                PCT_ASSEMBLY,
                "Assembling presentation",
            )
            .with_score(validation.as_ref().and_then(|v| v.overall_score)),
        );

        if let (Some(initial), Some(config)) = (scores, options.refinement) {
            let engine = RefinementEngine::new(validator.as_ref(), config);
            match engine
                .refine(
                    &mut generator,
                    presentation.clone(),
                    &outline,
                    request,
                    Some(initial),
                    ctx,
                )
                .await
            {
                Ok(outcome) => {
                    let refinement = RefinementSummary {
                        initial_score: outcome.initial_score,
                        final_score: outcome.final_score,
                        total_improvement: outcome.total_improvement,
                        rounds: outcome.history.len(),
                        target_achieved: outcome.target_achieved,
                        termination: outcome.termination.as_str().to_string(),
                    };
                    validation = Some(summary_from(&outcome.final_scores, Some(refinement)));
                    presentation = outcome.final_presentation;
                }
                Err(RefinementError::Cancelled) => return Err(PipelineError::Cancelled),
                Err(e) => {
                    ctx.record_fallback(
                        "refinement_engine",
                        e.to_string(),
                        "unrefined_presentation",
                        Impact::High,
                        None,
                    );
                    if let Some(v) = validation.as_mut() {
                        v.refinement = Some(neutral_refinement());
                    }
                }
            }
        }

        tracker.enter(GenerationPhase::Complete);
        ctx.emit(
            GenerationProgress::new(
                GenerationPhase::Complete,
                "complete",
                PCT_COMPLETE,
                format!("Generated {} slides", presentation.slides.len()),
            )
            .with_score(validation.as_ref().and_then(|v| v.overall_score)),
        );
        Ok((presentation, outline, validation))
    }
}

fn record_selection(debug_info: &mut DebugInfo, selection: &FrameworkSelection) {
    debug_info.framework_selected = selection.framework.id.to_string();
    debug_info.framework_confidence = selection.confidence;
    debug_info.framework_rationale = selection.rationale.clone();
    debug_info.framework_method = selection.method.as_str().to_string();
}

fn summary_from(scores: &PresentationScore, refinement: Option<RefinementSummary>) -> ValidationSummary {
    let slide_scores: Vec<u8> = scores.slides.iter().map(|f| f.score).collect();
    ValidationSummary {
        outline_score: Some(scores.outline.score),
        overall_score: aggregate_score(Some(scores.outline.score), &slide_scores),
        slide_scores,
        refinement,
    }
}

/// Reported when refinement itself failed and the unrefined deck is kept.
fn neutral_refinement() -> RefinementSummary {
    let neutral = ValidationFeedback::NEUTRAL_SCORE as f64;
    RefinementSummary {
        initial_score: neutral,
        final_score: neutral,
        total_improvement: 0.0,
        rounds: 0,
        target_achieved: false,
        termination: "failed".to_string(),
    }
}
