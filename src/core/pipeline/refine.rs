use serde::Serialize;
use tracing::{info, warn};

use crate::core::deck::{PresentationData, PresentationOutline, PresentationRequest};

use super::context::GenerationContext;
use super::slide::{SlideError, SlideGenerator};
use super::types::RefinementConfig;
use super::validator::{PresentationScore, Validator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    TargetAchieved,
    Plateau,
    RoundBudget,
}

impl Termination {
    pub fn as_str(self) -> &'static str {
        match self {
            Termination::TargetAchieved => "target_achieved",
            Termination::Plateau => "plateau",
            Termination::RoundBudget => "round_budget",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefinementRound {
    pub round: u32,
    pub score: f64,
    pub improvement: f64,
    pub action: String,
    pub revised_slides: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct RefinementOutcome {
    pub final_presentation: PresentationData,
    /// Scores of `final_presentation`.
    pub final_scores: PresentationScore,
    pub initial_score: f64,
    pub final_score: f64,
    pub total_improvement: f64,
    pub history: Vec<RefinementRound>,
    pub target_achieved: bool,
    pub termination: Termination,
}

#[derive(Debug, thiserror::Error)]
pub enum RefinementError {
    #[error("revision of slide {slide} failed: {source}")]
    Revision {
        slide: usize,
        #[source]
        source: SlideError,
    },
    #[error("refinement cancelled")]
    Cancelled,
}

/// Deck-level validate → revise loop. Always terminates: target reached,
/// improvement below the minimum, or round budget spent.
pub struct RefinementEngine<'a> {
    validator: &'a dyn Validator,
    config: RefinementConfig,
}

impl<'a> RefinementEngine<'a> {
    pub fn new(validator: &'a dyn Validator, config: RefinementConfig) -> Self {
        Self { validator, config }
    }

    /// `initial` lets the caller reuse scores it already has for round 1.
    pub async fn refine(
        &self,
        generator: &mut SlideGenerator,
        presentation: PresentationData,
        outline: &PresentationOutline,
        request: &PresentationRequest,
        initial: Option<PresentationScore>,
        ctx: &GenerationContext,
    ) -> Result<RefinementOutcome, RefinementError> {
        let rounds = self.config.max_refinement_rounds.max(1);
        let mut current = presentation;
        let mut pending_score = initial;
        let mut history: Vec<RefinementRound> = Vec::new();
        let mut best: Option<(PresentationScore, PresentationData)> = None;
        let mut termination = Termination::RoundBudget;

        for round in 1..=rounds {
            if ctx.is_cancelled() {
                return Err(RefinementError::Cancelled);
            }
            let score = match pending_score.take() {
                Some(s) => s,
                None => {
                    self.validator
                        .validate_presentation(&current, outline, request, ctx)
                        .await
                }
            };
            let overall = score.overall as f64;
            let improvement = history.last().map(|h| overall - h.score).unwrap_or(0.0);
            info!("Refinement round {}: score {:.1}", round, overall);

            if best.as_ref().is_none_or(|(s, _)| score.overall > s.overall) {
                best = Some((score.clone(), current.clone()));
            }

            let stop = if overall >= self.config.target_quality_score {
                Some(Termination::TargetAchieved)
            } else if !history.is_empty() && improvement < self.config.minimum_improvement {
                Some(Termination::Plateau)
            } else if round == rounds {
                Some(Termination::RoundBudget)
            } else {
                None
            };

            if let Some(reason) = stop {
                history.push(RefinementRound {
                    round,
                    score: overall,
                    improvement,
                    action: reason.as_str().to_string(),
                    revised_slides: Vec::new(),
                });
                termination = reason;
                break;
            }

            let targets = self.revision_targets(&score);
            for &number in &targets {
                if ctx.is_cancelled() {
                    return Err(RefinementError::Cancelled);
                }
                let (Some(entry), Some(feedback)) =
                    (outline.entry(number), score.slides.get(number - 1))
                else {
                    continue;
                };
                let Some(existing) = current.slides.get(number - 1) else {
                    continue;
                };
                let revised = generator
                    .revise_slide(entry, outline, existing, feedback, ctx)
                    .await
                    .map_err(|source| RefinementError::Revision {
                        slide: number,
                        source,
                    })?;
                generator.replace(number, revised.slide.clone());
                current.slides[number - 1] = revised.slide;
            }
            history.push(RefinementRound {
                round,
                score: overall,
                improvement,
                action: format!("revised {} slides", targets.len()),
                revised_slides: targets,
            });
        }

        let initial_score = history.first().map(|h| h.score).unwrap_or(0.0);
        let Some((final_scores, final_presentation)) = best else {
            // Only reachable when cancelled before the first round scored.
            return Err(RefinementError::Cancelled);
        };
        let final_score = final_scores.overall as f64;
        if termination != Termination::TargetAchieved {
            warn!(
                "Refinement stopped ({}) at {:.1}, target {:.1}",
                termination.as_str(),
                final_score,
                self.config.target_quality_score
            );
        }
        Ok(RefinementOutcome {
            final_presentation,
            final_scores,
            initial_score,
            final_score,
            total_improvement: final_score - initial_score,
            history,
            target_achieved: termination == Termination::TargetAchieved,
            termination,
        })
    }

    /// Lowest-scoring slides first, capped per round.
    fn revision_targets(&self, score: &PresentationScore) -> Vec<usize> {
        let mut ranked: Vec<(usize, u8)> = score
            .slides
            .iter()
            .enumerate()
            .map(|(i, f)| (i + 1, f.score))
            .collect();
        ranked.sort_by_key(|(n, s)| (*s, *n));
        let below: Vec<usize> = ranked
            .iter()
            .filter(|(_, s)| (*s as f64) < self.config.target_quality_score)
            .map(|(n, _)| *n)
            .take(self.config.max_slides_per_round)
            .collect();
        if !below.is_empty() {
            return below;
        }
        ranked
            .into_iter()
            .take(self.config.max_slides_per_round)
            .map(|(n, _)| n)
            .collect()
    }
}
