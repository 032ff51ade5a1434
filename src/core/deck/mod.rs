mod outline;
mod request;
mod slide;

pub use outline::{
    DEFAULT_SLIDE_TOKENS, DeckMetadata, PresentationOutline, SlideOutline, estimated_tokens_for,
};
pub use request::{
    MAX_PROMPT_CHARS, MAX_SLIDES, MIN_SLIDES, PresentationRequest, PresentationType, Tone,
};
pub use slide::{
    BulletListContent, CenteredContent, ChartContent, ChartData, ChartKind, CircleContent, Column,
    ContentError, EventStatus, Layout, Metric, MetricsContent, Section, SectionsContent, Series,
    Slide, SlideContent, SlideMetadata, SlideType, TableContent, TableData, TimelineContent,
    TimelineEvent, TitleContentBody, TitleOnlyContent, TwoColumnContent,
};

use serde::{Deserialize, Serialize};

/// The finished deck handed to the caller, exporters and renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationData {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub metadata: DeckMetadata,
    pub slides: Vec<Slide>,
}

impl PresentationData {
    /// Assembles the deck from its outline and the generated slides, in order.
    pub fn assemble(outline: &PresentationOutline, slides: Vec<Slide>) -> Self {
        let mut metadata = outline.metadata.clone();
        metadata.estimated_slides = slides.len();
        let seconds: u32 = slides
            .iter()
            .map(|s| s.metadata.estimated_duration_seconds)
            .sum();
        metadata.estimated_duration_minutes = seconds.div_ceil(60);
        Self {
            id: outline.id.clone(),
            title: outline.title.clone(),
            subtitle: outline.subtitle.clone(),
            description: outline.description.clone(),
            metadata,
            slides,
        }
    }
}
