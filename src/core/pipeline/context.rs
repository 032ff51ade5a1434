//! Per-run context threaded through every pipeline component: logging span,
//! progress callback, cancellation, fallback events and token accounting.
//! One instance per generation request; nothing here is process-wide.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::llm::{Completion, CompletionRequest, LlmError, LlmProvider};

use super::error::PipelineError;
use super::types::{FallbackEvent, GenerationProgress, Impact};

pub type ProgressCallback = Arc<dyn Fn(&GenerationProgress) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Created,
    Running,
    Completed,
    Failed,
}

#[derive(Default)]
struct Ledger {
    fallback_events: Vec<FallbackEvent>,
    progress: Vec<GenerationProgress>,
    tokens_used: u64,
    llm_calls: u64,
}

pub struct GenerationContext {
    generation_id: String,
    span: tracing::Span,
    started: Instant,
    cancel: CancellationToken,
    on_progress: Option<ProgressCallback>,
    status: Mutex<RunStatus>,
    ledger: Mutex<Ledger>,
}

impl GenerationContext {
    pub fn new(generation_id: &str) -> Self {
        Self {
            generation_id: generation_id.to_string(),
            span: tracing::info_span!("generation", id = %generation_id),
            started: Instant::now(),
            cancel: CancellationToken::new(),
            on_progress: None,
            status: Mutex::new(RunStatus::Created),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn generation_id(&self) -> &str {
        &self.generation_id
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    pub fn status(&self) -> RunStatus {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: RunStatus) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
    }

    pub fn start(&self, summary: &str) {
        let _g = self.span.enter();
        self.set_status(RunStatus::Running);
        info!("Generation started: {}", summary);
    }

    pub fn complete(&self) {
        let _g = self.span.enter();
        self.set_status(RunStatus::Completed);
        let ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        info!(
            "Generation completed in {}ms ({} LLM calls, {} tokens, {} fallbacks)",
            self.elapsed_ms(),
            ledger.llm_calls,
            ledger.tokens_used,
            ledger.fallback_events.len()
        );
    }

    pub fn fail(&self, err: &PipelineError) {
        let _g = self.span.enter();
        self.set_status(RunStatus::Failed);
        error!("Generation failed after {}ms: {}", self.elapsed_ms(), err);
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Runs one completion and books the call and its tokens.
    pub async fn complete_with(
        &self,
        provider: &dyn LlmProvider,
        request: &CompletionRequest,
    ) -> Result<Completion, LlmError> {
        let result = provider.complete(request).await;
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        ledger.llm_calls += 1;
        if let Ok(c) = &result {
            ledger.tokens_used += c.tokens_used;
        }
        result
    }

    pub fn record_fallback(
        &self,
        component: &str,
        reason: impl Into<String>,
        method: &str,
        impact: Impact,
        slide_number: Option<usize>,
    ) {
        let event = FallbackEvent {
            component: component.to_string(),
            reason: reason.into(),
            method: method.to_string(),
            impact,
            slide_number,
        };
        {
            let _g = self.span.enter();
            warn!(
                "Fallback in {}: {} (method: {}, impact: {:?})",
                event.component, event.reason, event.method, event.impact
            );
        }
        self.ledger
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fallback_events
            .push(event);
    }

    pub fn emit(&self, progress: GenerationProgress) {
        {
            let _g = self.span.enter();
            debug!(
                "[{}%] {} - {}",
                progress.percent_complete,
                progress.phase.as_str(),
                progress.message
            );
        }
        if let Some(cb) = &self.on_progress {
            cb(&progress);
        }
        self.ledger
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .progress
            .push(progress);
    }

    pub fn fallback_events(&self) -> Vec<FallbackEvent> {
        self.ledger
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .fallback_events
            .clone()
    }

    pub fn progress_log(&self) -> Vec<GenerationProgress> {
        self.ledger
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .progress
            .clone()
    }

    pub fn tokens_used(&self) -> u64 {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner()).tokens_used
    }

    pub fn llm_calls(&self) -> u64 {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner()).llm_calls
    }
}
