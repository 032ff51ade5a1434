use super::{deck_provider, options, outline_json, request, slide_json};
use crate::core::deck::{SlideContent, SlideType};
use crate::core::llm::{LlmError, ModelProfile};
use crate::core::pipeline::slide::FALLBACK_CALLOUT;
use crate::core::pipeline::types::Impact;
use crate::core::pipeline::{
    CATALOG, FrameworkStrategy, GenerationContext, GenerationOptions, IterativeOrchestrator,
};

#[tokio::test]
async fn well_formed_responses_produce_a_complete_deck() {
    let provider = deck_provider(outline_json(5).to_string(), |n| Ok(slide_json(n)));
    let orchestrator = IterativeOrchestrator::new(provider.clone(), ModelProfile::for_model("m"));
    let ctx = GenerationContext::new("scenario-a");

    let result = orchestrator
        .generate_presentation(&request(5), &options(), &ctx)
        .await;

    assert!(result.success, "errors: {:?}", result.errors);
    assert!(result.errors.is_empty());
    let deck = result.presentation.as_ref().unwrap();
    let outline = result.outline.as_ref().unwrap();
    assert_eq!(deck.slides.len(), 5);
    assert_eq!(outline.slides.len(), 5);
    assert!(outline.numbering_is_contiguous());
    assert_eq!(deck.title, "Capacity Review");
    assert_eq!(outline.slides[0].slide_type, SlideType::Title);
    assert!(CATALOG.iter().any(|f| f.id == result.debug_info.framework_selected));
    assert_eq!(deck.metadata.framework, result.debug_info.framework_selected);

    let validation = result.validation_results.as_ref().unwrap();
    assert_eq!(validation.slide_scores.len(), 5);
    assert_eq!(validation.outline_score, Some(100));
    let refinement = validation.refinement.as_ref().unwrap();
    assert!(refinement.target_achieved);
    assert_eq!(refinement.rounds, 1);

    assert_eq!(result.debug_info.slide_timings.len(), 5);
    assert!(result.debug_info.fallback_events.is_empty());
    assert_eq!(result.debug_info.llm_calls, 6);
    assert_eq!(provider.calls(), 6);
    assert!(result.debug_info.total_tokens > 0);
}

#[tokio::test]
async fn analytical_strategy_and_rubric_use_the_model() {
    let provider = deck_provider(outline_json(3).to_string(), |n| Ok(slide_json(n)));
    let orchestrator = IterativeOrchestrator::new(provider.clone(), ModelProfile::for_model("m"));
    let ctx = GenerationContext::new("scenario-rubric");
    let opts = GenerationOptions {
        framework_strategy: FrameworkStrategy::Analytical,
        llm_rubric: true,
        ..options()
    };

    let result = orchestrator.generate_presentation(&request(3), &opts, &ctx).await;

    assert!(result.success, "errors: {:?}", result.errors);
    assert_eq!(result.debug_info.framework_selected, "pyramid");
    assert_eq!(result.debug_info.framework_method, "llm");
    // Rules score 100 blended with a rubric score of 90.
    let validation = result.validation_results.unwrap();
    assert_eq!(validation.outline_score, Some(94));
    assert_eq!(validation.slide_scores, vec![94, 94, 94]);
    let prompts = provider.prompts();
    assert!(prompts.iter().any(|p| p.contains("TASK: OUTLINE REVIEW")));
    assert_eq!(
        prompts.iter().filter(|p| p.contains("TASK: SLIDE REVIEW")).count(),
        3
    );
}

#[tokio::test]
async fn truncated_outline_is_repaired() {
    let text = outline_json(5).to_string();
    let truncated = text[..text.len() - 1].to_string();
    let provider = deck_provider(truncated, |n| Ok(slide_json(n)));
    let orchestrator = IterativeOrchestrator::new(provider, ModelProfile::for_model("m"));
    let ctx = GenerationContext::new("scenario-b");

    let result = orchestrator
        .generate_presentation(&request(5), &options(), &ctx)
        .await;

    assert!(result.success, "errors: {:?}", result.errors);
    let deck = result.presentation.unwrap();
    assert_eq!(deck.title, "Capacity Review");
    assert_eq!(deck.slides.len(), 5);
    let events = &result.debug_info.fallback_events;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].component, "outline_generator");
    assert!(events[0].reason.contains("balance"), "{:?}", events[0]);
    assert_eq!(events[0].impact, Impact::Low);
}

#[tokio::test]
async fn prose_outline_fails_the_run() {
    let provider = deck_provider(
        "I'd be happy to help with your presentation! First, consider your audience.".to_string(),
        |n| Ok(slide_json(n)),
    );
    let orchestrator = IterativeOrchestrator::new(provider.clone(), ModelProfile::for_model("m"));
    let ctx = GenerationContext::new("scenario-c");

    let result = orchestrator
        .generate_presentation(&request(5), &options(), &ctx)
        .await;

    assert!(!result.success);
    assert!(result.presentation.is_none());
    assert!(result.outline.is_none());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("could not parse the outline"));
    assert_eq!(result.error_status, Some(500));
    // One retry of the outline, no slide calls.
    assert_eq!(provider.calls(), 2);
}

#[tokio::test]
async fn outline_with_the_wrong_slide_count_is_rejected() {
    let provider = deck_provider(outline_json(4).to_string(), |n| Ok(slide_json(n)));
    let orchestrator = IterativeOrchestrator::new(provider, ModelProfile::for_model("m"));
    let ctx = GenerationContext::new("scenario-count");

    let result = orchestrator
        .generate_presentation(&request(5), &options(), &ctx)
        .await;

    assert!(!result.success);
    assert!(result.errors[0].contains("expected 5 slides"));
}

#[tokio::test]
async fn failing_slide_is_replaced_by_a_fallback() {
    let provider = deck_provider(outline_json(5).to_string(), |n| {
        if n == 3 {
            Err(LlmError::Provider {
                provider: "Mock".to_string(),
                status: 500,
                message: "boom".to_string(),
            })
        } else {
            Ok(slide_json(n))
        }
    });
    let orchestrator = IterativeOrchestrator::new(provider.clone(), ModelProfile::for_model("m"));
    let ctx = GenerationContext::new("scenario-d");

    let result = orchestrator
        .generate_presentation(&request(5), &options(), &ctx)
        .await;

    assert!(result.success, "errors: {:?}", result.errors);
    let deck = result.presentation.unwrap();
    assert_eq!(deck.slides.len(), 5);
    let SlideContent::TitleContent(body) = &deck.slides[2].body else {
        panic!("fallback slide should use the title-content layout");
    };
    assert_eq!(body.callout.as_deref(), Some(FALLBACK_CALLOUT));
    assert_eq!(deck.slides[2].title, "Point 3");

    let events = &result.debug_info.fallback_events;
    let slide_event = events
        .iter()
        .find(|e| e.slide_number == Some(3))
        .expect("fallback event for slide 3");
    assert_eq!(slide_event.component, "slide_generator");
    assert_eq!(slide_event.impact, Impact::Medium);

    let timing = &result.debug_info.slide_timings[2];
    assert!(timing.fallback);
    assert_eq!(timing.retry_count, 2);
    // Initial attempt plus two retries; fallback slides skip the quality gate.
    let slide_three_calls = provider
        .prompts()
        .iter()
        .filter(|p| p.contains("SLIDE NUMBER: 3 of 5"))
        .count();
    assert_eq!(slide_three_calls, 3);
}

#[tokio::test]
async fn low_scoring_slide_is_reworked_by_the_quality_gate() {
    // First answer for slide 2 has a single bullet, a second attempt is clean.
    let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = seen.clone();
    let provider = deck_provider(outline_json(3).to_string(), move |n| {
        if n == 2 && counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
            Ok(r#"{"layout": "bullet_list", "content": {"bulletPoints": ["only"]}}"#.to_string())
        } else {
            Ok(slide_json(n))
        }
    });
    let orchestrator = IterativeOrchestrator::new(provider, ModelProfile::for_model("m"));
    let ctx = GenerationContext::new("scenario-gate");
    let opts = GenerationOptions {
        min_slide_score: 95,
        ..options()
    };

    let result = orchestrator.generate_presentation(&request(3), &opts, &ctx).await;

    assert!(result.success, "errors: {:?}", result.errors);
    let timing = &result.debug_info.slide_timings[1];
    assert_eq!(timing.quality_attempts, 2);
    assert_eq!(result.validation_results.unwrap().slide_scores[1], 100);
    assert!(seen.load(std::sync::atomic::Ordering::SeqCst) >= 2);
}
