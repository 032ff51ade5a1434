use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::{PresentationType, Tone};
use super::slide::SlideType;

pub const DEFAULT_SLIDE_TOKENS: u32 = 500;

/// Advisory per-type token estimate; never gates success.
pub fn estimated_tokens_for(slide_type: SlideType) -> u32 {
    match slide_type {
        SlideType::Title => 300,
        SlideType::Problem | SlideType::Solution | SlideType::Benefits => 600,
        SlideType::Implementation | SlideType::Framework => 800,
        SlideType::Timeline => 700,
        SlideType::Conclusion => 400,
        SlideType::Chart | SlideType::Table => 900,
        SlideType::Custom => DEFAULT_SLIDE_TOKENS,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckMetadata {
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub presentation_type: PresentationType,
    pub audience: Option<String>,
    pub tone: Tone,
    pub framework: String,
    pub estimated_slides: usize,
    pub estimated_duration_minutes: u32,
    pub total_estimated_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideOutline {
    /// 1-based, always equal to the entry's position.
    pub number: usize,
    #[serde(rename = "type")]
    pub slide_type: SlideType,
    pub title: String,
    pub purpose: String,
    pub key_points: Vec<String>,
    pub estimated_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationOutline {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub metadata: DeckMetadata,
    pub slides: Vec<SlideOutline>,
}

impl PresentationOutline {
    /// Re-derives every entry's token estimate and the metadata total.
    pub fn annotate_token_estimates(&mut self) {
        let mut total = 0;
        for entry in &mut self.slides {
            entry.estimated_tokens = estimated_tokens_for(entry.slide_type);
            total += entry.estimated_tokens;
        }
        self.metadata.total_estimated_tokens = total;
    }

    /// Numbers are contiguous `1..=N` and match positions.
    pub fn numbering_is_contiguous(&self) -> bool {
        self.slides
            .iter()
            .enumerate()
            .all(|(i, s)| s.number == i + 1)
    }

    pub fn entry(&self, number: usize) -> Option<&SlideOutline> {
        number.checked_sub(1).and_then(|i| self.slides.get(i))
    }
}
