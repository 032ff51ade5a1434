use serde::{Deserialize, Serialize};

use crate::core::pipeline::PipelineError;

pub const MIN_SLIDES: usize = 3;
pub const MAX_SLIDES: usize = 30;
pub const MAX_PROMPT_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationType {
    Business,
    Technical,
    Process,
    Transformation,
    Pov,
    Custom,
}

impl PresentationType {
    pub fn as_str(self) -> &'static str {
        match self {
            PresentationType::Business => "business",
            PresentationType::Technical => "technical",
            PresentationType::Process => "process",
            PresentationType::Transformation => "transformation",
            PresentationType::Pov => "pov",
            PresentationType::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "business" => Some(PresentationType::Business),
            "technical" => Some(PresentationType::Technical),
            "process" => Some(PresentationType::Process),
            "transformation" => Some(PresentationType::Transformation),
            "pov" | "point_of_view" => Some(PresentationType::Pov),
            "custom" => Some(PresentationType::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    #[default]
    Professional,
    Conversational,
    Technical,
    Executive,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Conversational => "conversational",
            Tone::Technical => "technical",
            Tone::Executive => "executive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "professional" => Some(Tone::Professional),
            "conversational" => Some(Tone::Conversational),
            "technical" => Some(Tone::Technical),
            "executive" => Some(Tone::Executive),
            _ => None,
        }
    }
}

/// What the user asked for. Only constructed through [`PresentationRequest::new`],
/// so every instance has already passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationRequest {
    pub prompt: String,
    pub presentation_type: PresentationType,
    pub slide_count: usize,
    pub audience: Option<String>,
    pub tone: Tone,
}

impl PresentationRequest {
    pub fn new(
        prompt: &str,
        presentation_type: PresentationType,
        slide_count: usize,
        audience: Option<&str>,
        tone: Tone,
    ) -> Result<Self, PipelineError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "prompt is required".to_string(),
            ));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(PipelineError::InvalidRequest(format!(
                "prompt must be at most {} characters",
                MAX_PROMPT_CHARS
            )));
        }
        if !(MIN_SLIDES..=MAX_SLIDES).contains(&slide_count) {
            return Err(PipelineError::InvalidRequest(format!(
                "slide_count must be between {} and {}",
                MIN_SLIDES, MAX_SLIDES
            )));
        }
        let audience = audience
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        Ok(Self {
            prompt: prompt.to_string(),
            presentation_type,
            slide_count,
            audience,
            tone,
        })
    }

    pub fn audience_or_default(&self) -> &str {
        self.audience.as_deref().unwrap_or("general business audience")
    }
}
