pub mod context;
mod error;
pub mod framework;
pub mod orchestrator;
pub mod outline;
pub mod refine;
pub mod repair;
pub mod retry;
pub mod slide;
pub mod types;
pub mod validator;

pub use context::{GenerationContext, ProgressCallback};
pub use error::PipelineError;
pub use framework::{CATALOG, Framework, FrameworkSelection};
pub use orchestrator::IterativeOrchestrator;
pub use retry::RetryPolicy;
pub use types::{
    FrameworkStrategy, GenerationOptions, GenerationPhase, GenerationProgress,
    IterativeGenerationResult, RefinementConfig,
};

/// Phases only move forward; terminal phases are final.
pub fn can_transition(from: GenerationPhase, to: GenerationPhase) -> bool {
    if from == to {
        return true;
    }
    match from {
        GenerationPhase::Outline => matches!(
            to,
            GenerationPhase::Slides | GenerationPhase::Failed | GenerationPhase::Cancelled
        ),
        GenerationPhase::Slides => matches!(
            to,
            GenerationPhase::Validation | GenerationPhase::Failed | GenerationPhase::Cancelled
        ),
        GenerationPhase::Validation => matches!(
            to,
            GenerationPhase::Complete | GenerationPhase::Failed | GenerationPhase::Cancelled
        ),
        GenerationPhase::Complete | GenerationPhase::Failed | GenerationPhase::Cancelled => false,
    }
}

#[cfg(test)]
pub(crate) mod tests;
