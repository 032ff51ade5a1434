//! Narrative framework catalog and selection.
//!
//! The catalog is a static table. Selection is either a keyword heuristic
//! (no LLM call) or a single classification call; the latter degrades to
//! SCQA on any failure instead of erroring.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::deck::{PresentationRequest, PresentationType};
use crate::core::llm::{LlmProvider, ModelConfig};

use super::context::GenerationContext;
use super::repair::parse_with_repair;
use super::types::{FrameworkStrategy, Impact};

#[derive(Debug, Serialize)]
pub struct FrameworkStep {
    pub label: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Framework {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub steps: &'static [FrameworkStep],
    pub best_for: &'static [&'static str],
}

pub const DEFAULT_FRAMEWORK: &str = "scqa";

/// Order matters: the first id found in an LLM recommendation wins.
pub const PRIORITY: [&str; 5] = ["scqa", "prep", "star", "pyramid", "comparison"];

pub static CATALOG: [Framework; 5] = [
    Framework {
        id: "scqa",
        name: "SCQA",
        description: "Situation, Complication, Question, Answer: builds tension before the recommendation.",
        steps: &[
            FrameworkStep { label: "Situation", description: "Establish the shared context the audience already accepts." },
            FrameworkStep { label: "Complication", description: "Introduce the change or problem that disturbs the situation." },
            FrameworkStep { label: "Question", description: "Frame the question the complication raises." },
            FrameworkStep { label: "Answer", description: "Deliver the recommendation and how to act on it." },
        ],
        best_for: &["strategy", "problem", "business case", "transformation", "change"],
    },
    Framework {
        id: "prep",
        name: "PREP",
        description: "Point, Reason, Example, Point: a compact argument for a position.",
        steps: &[
            FrameworkStep { label: "Point", description: "State the position up front." },
            FrameworkStep { label: "Reason", description: "Explain why the position holds." },
            FrameworkStep { label: "Example", description: "Ground the reason in concrete evidence." },
            FrameworkStep { label: "Point", description: "Restate the position as a call to action." },
        ],
        best_for: &["opinion", "point of view", "proposal", "recommend", "argument", "should"],
    },
    Framework {
        id: "star",
        name: "STAR",
        description: "Situation, Task, Action, Result: tells the story of work that was done.",
        steps: &[
            FrameworkStep { label: "Situation", description: "Describe the starting conditions." },
            FrameworkStep { label: "Task", description: "Define what had to be achieved." },
            FrameworkStep { label: "Action", description: "Walk through the steps taken." },
            FrameworkStep { label: "Result", description: "Quantify the outcome and lessons learned." },
        ],
        best_for: &["case study", "success story", "lessons learned", "retrospective", "project review", "process"],
    },
    Framework {
        id: "pyramid",
        name: "Pyramid Principle",
        description: "Lead with the conclusion, then group supporting arguments beneath it.",
        steps: &[
            FrameworkStep { label: "Governing thought", description: "Open with the single main conclusion." },
            FrameworkStep { label: "Key arguments", description: "Give three to five arguments that support it." },
            FrameworkStep { label: "Supporting data", description: "Back each argument with facts and figures." },
            FrameworkStep { label: "Next steps", description: "Close with the decision or action required." },
        ],
        best_for: &["executive", "board", "ceo", "cto", "cfo", "leadership", "architecture", "technical"],
    },
    Framework {
        id: "comparison",
        name: "Comparison",
        description: "Weighs options side by side against explicit criteria.",
        steps: &[
            FrameworkStep { label: "Context", description: "Explain the decision to be made." },
            FrameworkStep { label: "Options", description: "Introduce each alternative." },
            FrameworkStep { label: "Criteria", description: "Compare the options on shared criteria." },
            FrameworkStep { label: "Recommendation", description: "Pick an option and justify it." },
        ],
        best_for: &["vs", "versus", "compare", "comparison", "alternatives", "options", "trade-off", "tradeoff"],
    },
];

pub fn find_framework(id: &str) -> Option<&'static Framework> {
    CATALOG.iter().find(|f| f.id.eq_ignore_ascii_case(id))
}

fn default_framework() -> &'static Framework {
    &CATALOG[0]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    Heuristic,
    Llm,
    Fallback,
}

impl SelectionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SelectionMethod::Heuristic => "heuristic",
            SelectionMethod::Llm => "llm",
            SelectionMethod::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameworkSelection {
    pub framework: &'static Framework,
    pub confidence: f64,
    pub rationale: String,
    pub method: SelectionMethod,
}

impl FrameworkSelection {
    fn fallback(reason: &str) -> Self {
        Self {
            framework: default_framework(),
            confidence: 0.5,
            rationale: format!("Fallback to SCQA: {}", reason),
            method: SelectionMethod::Fallback,
        }
    }
}

fn contains_keyword(haystack: &str, keyword: &str) -> bool {
    if keyword.len() <= 3 {
        // Short keywords ("vs", "cto") must be whole words.
        haystack
            .split(|c: char| !c.is_alphanumeric())
            .any(|w| w == keyword)
    } else {
        haystack.contains(keyword)
    }
}

fn type_default(presentation_type: PresentationType) -> &'static str {
    match presentation_type {
        PresentationType::Business
        | PresentationType::Transformation
        | PresentationType::Custom => "scqa",
        PresentationType::Technical => "pyramid",
        PresentationType::Process => "star",
        PresentationType::Pov => "prep",
    }
}

/// Keyword match against the topic first, then the audience, then the
/// declared type. Pure; never calls the model.
pub fn select_framework(
    topic: &str,
    audience: Option<&str>,
    presentation_type: PresentationType,
) -> FrameworkSelection {
    let topic = topic.to_lowercase();
    let audience = audience.unwrap_or_default().to_lowercase();

    for (text, source, confidence) in [(&topic, "topic", 0.8), (&audience, "audience", 0.7)] {
        if text.is_empty() {
            continue;
        }
        for id in PRIORITY.iter().rev() {
            let Some(framework) = find_framework(id) else {
                continue;
            };
            if let Some(kw) = framework
                .best_for
                .iter()
                .find(|kw| contains_keyword(text, kw))
            {
                return FrameworkSelection {
                    framework,
                    confidence,
                    rationale: format!("{} mentions '{}'", source, kw),
                    method: SelectionMethod::Heuristic,
                };
            }
        }
    }

    let framework = find_framework(type_default(presentation_type)).unwrap_or(default_framework());
    FrameworkSelection {
        framework,
        confidence: 0.6,
        rationale: format!(
            "default for {} presentations",
            presentation_type.as_str()
        ),
        method: SelectionMethod::Heuristic,
    }
}

fn framework_prompt(request: &PresentationRequest) -> String {
    let catalog = CATALOG
        .iter()
        .map(|f| format!("- {} ({}): {}", f.id, f.name, f.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "TASK: FRAMEWORK SELECTION\n\n\
         Pick the narrative framework that best fits this presentation.\n\n\
         TOPIC: {}\nAUDIENCE: {}\nTYPE: {}\n\n\
         AVAILABLE FRAMEWORKS:\n{}\n\n\
         Respond with JSON only, no markdown:\n\
         {{\"recommendation\": \"<framework id>\", \"confidence\": 0.0-1.0, \"rationale\": \"<one sentence>\"}}",
        request.prompt,
        request.audience_or_default(),
        request.presentation_type.as_str(),
        catalog
    )
}

/// Case-insensitive substring match in priority order.
pub fn match_recommendation(recommendation: &str) -> Option<&'static Framework> {
    let rec = recommendation.to_lowercase();
    PRIORITY
        .iter()
        .find(|id| rec.contains(*id))
        .and_then(|id| find_framework(id))
}

fn parse_selection(raw: &str) -> Result<FrameworkSelection, String> {
    let repaired = parse_with_repair(raw, &|v: &Value| v.get("recommendation").is_some())
        .map_err(|e| e.to_string())?;
    let value = repaired.value;
    let recommendation = value
        .get("recommendation")
        .and_then(Value::as_str)
        .ok_or("recommendation is not a string")?;
    let framework = match_recommendation(recommendation)
        .ok_or_else(|| format!("no catalog match for '{}'", recommendation))?;
    let mut confidence = value.get("confidence").and_then(Value::as_f64).unwrap_or(0.7);
    if confidence > 1.0 {
        confidence /= 100.0;
    }
    Ok(FrameworkSelection {
        framework,
        confidence: confidence.clamp(0.0, 1.0),
        rationale: value
            .get("rationale")
            .and_then(Value::as_str)
            .unwrap_or("selected by model")
            .to_string(),
        method: SelectionMethod::Llm,
    })
}

/// One classification call. Any failure yields the SCQA fallback.
pub async fn select_framework_with_llm(
    provider: &dyn LlmProvider,
    model: &ModelConfig,
    request: &PresentationRequest,
    ctx: &GenerationContext,
) -> FrameworkSelection {
    let req = model.request(None, framework_prompt(request));
    let outcome = match ctx.complete_with(provider, &req).await {
        Ok(completion) => parse_selection(&completion.text),
        Err(e) => Err(e.to_string()),
    };
    match outcome {
        Ok(selection) => {
            debug!(
                "Model recommended {} ({:.2})",
                selection.framework.id, selection.confidence
            );
            selection
        }
        Err(reason) => {
            ctx.record_fallback(
                "framework_selector",
                reason.clone(),
                "default_framework",
                Impact::Low,
                None,
            );
            FrameworkSelection::fallback(&reason)
        }
    }
}

pub async fn choose_framework(
    strategy: FrameworkStrategy,
    provider: &dyn LlmProvider,
    model: &ModelConfig,
    request: &PresentationRequest,
    ctx: &GenerationContext,
) -> FrameworkSelection {
    let selection = match strategy {
        FrameworkStrategy::Heuristic => select_framework(
            &request.prompt,
            request.audience.as_deref(),
            request.presentation_type,
        ),
        FrameworkStrategy::Analytical => {
            select_framework_with_llm(provider, model, request, ctx).await
        }
    };
    info!(
        "Framework selected: {} via {} ({:.2})",
        selection.framework.id,
        selection.method.as_str(),
        selection.confidence
    );
    selection
}
