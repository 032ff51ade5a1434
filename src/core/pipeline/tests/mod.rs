mod progress;
mod scenarios;

use std::sync::Arc;

use serde_json::{Value, json};

use crate::core::deck::{PresentationRequest, PresentationType, Tone};
use crate::core::llm::LlmError;
use crate::core::llm::mock::ScriptedProvider;
use crate::core::pipeline::{GenerationOptions, RetryPolicy};

pub(crate) fn request(count: usize) -> PresentationRequest {
    PresentationRequest::new(
        "Quarterly capacity review for the platform team",
        PresentationType::Business,
        count,
        Some("engineering leadership"),
        Tone::Professional,
    )
    .unwrap()
}

pub(crate) fn outline_json(count: usize) -> Value {
    let slides: Vec<Value> = (1..=count)
        .map(|i| {
            let slide_type = match i {
                1 => "title",
                n if n == count => "conclusion",
                _ => "problem",
            };
            json!({
                "title": format!("Point {}", i),
                "type": slide_type,
                "purpose": format!("Cover point {}", i),
                "keyPoints": ["context", "impact"]
            })
        })
        .collect();
    json!({
        "title": "Capacity Review",
        "subtitle": "Q3",
        "metadata": {"author": "Platform", "estimatedDuration": 12},
        "slides": slides
    })
}

pub(crate) fn slide_json(number: usize) -> String {
    json!({
        "title": format!("Point {}", number),
        "layout": "bullet_list",
        "content": {"bulletPoints": ["Demand grew 30%", "Headroom is 12%", "Order hardware now"]},
        "metadata": {"speakerNotes": "Walk through the numbers", "estimatedDurationSeconds": 60}
    })
    .to_string()
}

pub(crate) fn slide_number(prompt: &str) -> usize {
    prompt
        .split("SLIDE NUMBER: ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

/// Answers each pipeline prompt by its task marker. Slides are delegated to
/// `slide` with the slide number parsed from the prompt.
pub(crate) fn deck_provider<F>(outline: String, slide: F) -> Arc<ScriptedProvider>
where
    F: Fn(usize) -> Result<String, LlmError> + Send + Sync + 'static,
{
    Arc::new(ScriptedProvider::new(move |req| {
        let prompt = req.prompt.as_str();
        if prompt.contains("TASK: PRESENTATION OUTLINE") {
            Ok(outline.clone())
        } else if prompt.contains("TASK: SINGLE SLIDE") {
            slide(slide_number(prompt))
        } else if prompt.contains("TASK: FRAMEWORK SELECTION") {
            Ok(r#"{"recommendation": "pyramid", "confidence": 0.9, "rationale": "data heavy"}"#.to_string())
        } else {
            Ok(r#"{"score": 90, "issues": []}"#.to_string())
        }
    }))
}

pub(crate) fn options() -> GenerationOptions {
    GenerationOptions {
        llm_rubric: false,
        outline_retry: RetryPolicy::immediate(1),
        slide_retry: RetryPolicy::immediate(2),
        ..GenerationOptions::default()
    }
}
