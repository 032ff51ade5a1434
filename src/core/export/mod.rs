//! Export sinks for finished decks.
//!
//! Each sink turns a [`PresentationData`] into bytes in one format. Image and
//! PPTX output live outside this crate; they would plug in here through the
//! same trait.

mod markdown;

use anyhow::{Result, anyhow};

use crate::core::deck::PresentationData;

pub use markdown::MarkdownExporter;

pub trait ExportSink: Send + Sync {
    fn format(&self) -> &'static str;

    fn content_type(&self) -> &'static str;

    fn export(&self, deck: &PresentationData) -> Result<Vec<u8>>;
}

/// Pretty-printed JSON, the same shape the API returns.
pub struct JsonExporter;

impl ExportSink for JsonExporter {
    fn format(&self) -> &'static str {
        "json"
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn export(&self, deck: &PresentationData) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(deck)?)
    }
}

pub const FORMATS: [&str; 2] = ["json", "markdown"];

pub fn exporter_for(format: &str) -> Result<Box<dyn ExportSink>> {
    match format.trim().to_lowercase().as_str() {
        "json" => Ok(Box::new(JsonExporter)),
        "markdown" | "md" => Ok(Box::new(MarkdownExporter)),
        other => Err(anyhow!(
            "Unsupported export format '{}' (expected one of: {})",
            other,
            FORMATS.join(", ")
        )),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{TimeZone, Utc};

    use crate::core::deck::*;

    fn slide(n: usize, slide_type: SlideType, title: &str, body: SlideContent) -> Slide {
        Slide {
            id: format!("slide-{}", n),
            slide_type,
            title: title.to_string(),
            subtitle: None,
            body,
            metadata: SlideMetadata {
                speaker_notes: format!("Notes for {}", title),
                ..SlideMetadata::default()
            },
        }
    }

    /// One slide per layout.
    pub(crate) fn every_layout_deck() -> PresentationData {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let sections = SectionsContent {
            sections: vec![
                Section {
                    title: "Ingest".to_string(),
                    description: "Collect usage".to_string(),
                    items: strings(&["agents"]),
                },
                Section {
                    title: "Forecast".to_string(),
                    description: "Project demand".to_string(),
                    items: Vec::new(),
                },
            ],
        };
        let bodies = vec![
            (
                SlideType::Title,
                "Capacity Review",
                SlideContent::TitleOnly(TitleOnlyContent {
                    tagline: Some("Q3 planning".to_string()),
                }),
            ),
            (
                SlideType::Problem,
                "Where we are",
                SlideContent::TitleContent(TitleContentBody {
                    body: Some("Demand keeps climbing.".to_string()),
                    bullet_points: strings(&["CPU at 70%"]),
                    callout: Some("Act this quarter".to_string()),
                }),
            ),
            (
                SlideType::Solution,
                "Build or buy",
                SlideContent::TwoColumn(TwoColumnContent {
                    left: Column {
                        title: "Build".to_string(),
                        items: strings(&["control"]),
                    },
                    right: Column {
                        title: "Buy".to_string(),
                        items: strings(&["speed"]),
                    },
                }),
            ),
            (
                SlideType::Benefits,
                "Why now",
                SlideContent::BulletList(BulletListContent {
                    bullet_points: strings(&["cheaper", "faster"]),
                }),
            ),
            (
                SlideType::Custom,
                "One idea",
                SlideContent::Centered(CenteredContent {
                    statement: "Headroom is a feature".to_string(),
                    supporting: Some("not a cost".to_string()),
                }),
            ),
            (SlideType::Framework, "Pipeline", SlideContent::Diagram(sections.clone())),
            (
                SlideType::Benefits,
                "Results",
                SlideContent::Metrics(MetricsContent {
                    metrics: vec![Metric {
                        label: "Uptime".to_string(),
                        value: "99.9%".to_string(),
                        trend: Some("up".to_string()),
                        description: None,
                    }],
                }),
            ),
            (
                SlideType::Chart,
                "Growth",
                SlideContent::Chart(ChartContent {
                    chart: ChartData {
                        chart_type: ChartKind::Line,
                        title: Some("Requests".to_string()),
                        labels: strings(&["Jan", "Feb"]),
                        series: vec![Series {
                            name: "rps".to_string(),
                            values: vec![10.0, 12.5],
                        }],
                    },
                }),
            ),
            (
                SlideType::Framework,
                "Flywheel",
                SlideContent::Circle(CircleContent {
                    center: "Platform".to_string(),
                    items: strings(&["adopt", "measure", "improve"]),
                }),
            ),
            (SlideType::Solution, "Decision", SlideContent::Diamond(sections)),
            (
                SlideType::Table,
                "Costs",
                SlideContent::Table(TableContent {
                    table: TableData {
                        headers: strings(&["Item", "Cost"]),
                        rows: vec![strings(&["Nodes", "$10k"]), strings(&["Ops|on-call", "$2k"])],
                    },
                }),
            ),
            (
                SlideType::Timeline,
                "Roadmap",
                SlideContent::Timeline(TimelineContent {
                    events: vec![
                        TimelineEvent {
                            date: "Q3".to_string(),
                            title: "Order".to_string(),
                            description: None,
                            status: EventStatus::Completed,
                        },
                        TimelineEvent {
                            date: "Q4".to_string(),
                            title: "Rack".to_string(),
                            description: Some("two sites".to_string()),
                            status: EventStatus::Planned,
                        },
                    ],
                }),
            ),
        ];
        let slides: Vec<Slide> = bodies
            .into_iter()
            .enumerate()
            .map(|(i, (t, title, body))| slide(i + 1, t, title, body))
            .collect();
        PresentationData {
            id: "deck-1".to_string(),
            title: "Capacity Review".to_string(),
            subtitle: Some("Q3".to_string()),
            description: None,
            metadata: DeckMetadata {
                author: "Platform".to_string(),
                created_at: Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap(),
                presentation_type: PresentationType::Business,
                audience: Some("leadership".to_string()),
                tone: Tone::Professional,
                framework: "scqa".to_string(),
                estimated_slides: slides.len(),
                estimated_duration_minutes: 18,
                total_estimated_tokens: 0,
            },
            slides,
        }
    }
}
