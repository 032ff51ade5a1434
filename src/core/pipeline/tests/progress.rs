use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use super::{deck_provider, options, outline_json, request, slide_json};
use crate::core::llm::ModelProfile;
use crate::core::pipeline::orchestrator::slide_percent;
use crate::core::pipeline::{
    GenerationContext, GenerationPhase, GenerationProgress, IterativeOrchestrator,
};

fn recording_context(id: &str) -> (GenerationContext, Arc<Mutex<Vec<GenerationProgress>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let ctx = GenerationContext::new(id).with_progress(Arc::new(move |p: &GenerationProgress| {
        sink.lock().unwrap().push(p.clone());
    }));
    (ctx, events)
}

#[test]
fn slide_percent_spans_thirty_to_eighty() {
    assert_eq!(slide_percent(0, 5), 30);
    assert_eq!(slide_percent(1, 5), 40);
    assert_eq!(slide_percent(5, 5), 80);
    assert_eq!(slide_percent(9, 5), 80);
    assert_eq!(slide_percent(0, 0), 80);
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_at_one_hundred() {
    let provider = deck_provider(outline_json(5).to_string(), |n| Ok(slide_json(n)));
    let orchestrator = IterativeOrchestrator::new(provider, ModelProfile::for_model("m"));
    let (ctx, events) = recording_context("progress-1");

    let result = orchestrator
        .generate_presentation(&request(5), &options(), &ctx)
        .await;
    assert!(result.success, "errors: {:?}", result.errors);

    let events = events.lock().unwrap().clone();
    let percents: Vec<u8> = events.iter().map(|e| e.percent_complete).collect();
    assert!(
        percents.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {:?}",
        percents
    );
    assert_eq!(percents.first(), Some(&5));
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.contains(&15) && percents.contains(&25) && percents.contains(&85));

    let slide_events: Vec<&GenerationProgress> =
        events.iter().filter(|e| e.slide_number.is_some()).collect();
    assert_eq!(slide_events.len(), 5);
    for (i, e) in slide_events.iter().enumerate() {
        assert_eq!(e.slide_number, Some(i + 1));
        assert_eq!(e.total_slides, Some(5));
        assert_eq!(e.phase, GenerationPhase::Slides);
    }
    assert_eq!(events.last().map(|e| e.phase), Some(GenerationPhase::Complete));
    assert_eq!(result.debug_info.progress_events, events.len());
}

#[tokio::test]
async fn cancellation_between_slides_stops_the_run() {
    let provider = deck_provider(outline_json(5).to_string(), |n| Ok(slide_json(n)));
    let orchestrator = IterativeOrchestrator::new(provider.clone(), ModelProfile::for_model("m"));
    let token = CancellationToken::new();
    let trigger = token.clone();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let ctx = GenerationContext::new("progress-2")
        .with_cancellation(token)
        .with_progress(Arc::new(move |p: &GenerationProgress| {
            if p.slide_number == Some(2) {
                trigger.cancel();
            }
            sink.lock().unwrap().push(p.clone());
        }));

    let result = orchestrator
        .generate_presentation(&request(5), &options(), &ctx)
        .await;

    assert!(!result.success);
    assert!(result.presentation.is_none());
    assert_eq!(result.error_status, Some(499));
    let events = events.lock().unwrap().clone();
    let last = events.last().unwrap();
    assert_eq!(last.phase, GenerationPhase::Cancelled);
    assert_eq!(last.percent_complete, slide_percent(2, 5));
    // Outline plus two slides.
    assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn failure_event_keeps_the_last_percentage() {
    let provider = deck_provider("not json at all".to_string(), |n| Ok(slide_json(n)));
    let orchestrator = IterativeOrchestrator::new(provider, ModelProfile::for_model("m"));
    let (ctx, events) = recording_context("progress-3");

    let result = orchestrator
        .generate_presentation(&request(3), &options(), &ctx)
        .await;

    assert!(!result.success);
    let events = events.lock().unwrap().clone();
    let last = events.last().unwrap();
    assert_eq!(last.phase, GenerationPhase::Failed);
    assert_eq!(last.percent_complete, 15);
}
