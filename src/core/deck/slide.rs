//! Fully realized slides. The content body is a sum type keyed by layout, so
//! every consumer (validator, exporter) matches exhaustively instead of
//! probing optional fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Deserializers for text fields that models often fill with numbers,
/// such as `"value": 12` or a table row `["Q1", 72]`.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn scalar_text(value: Value) -> String {
        match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Value::deserialize(d).map(scalar_text)
    }

    pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Vec::<Value>::deserialize(d).map(|items| items.into_iter().map(scalar_text).collect())
    }

    pub fn rows<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<String>>, D::Error> {
        Vec::<Vec<Value>>::deserialize(d).map(|rows| {
            rows.into_iter()
                .map(|row| row.into_iter().map(scalar_text).collect())
                .collect()
        })
    }

    /// Whole seconds from a number or a numeric string; anything else keeps
    /// the default.
    pub fn seconds<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let raw = match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('s').trim().parse::<f64>().ok(),
            _ => None,
        };
        Ok(raw
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| secs.round().min(u32::MAX as f64) as u32)
            .unwrap_or_else(super::default_duration))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideType {
    Title,
    Problem,
    Solution,
    Benefits,
    Implementation,
    Framework,
    Timeline,
    Conclusion,
    Chart,
    Table,
    Custom,
}

impl SlideType {
    pub const ALL: [SlideType; 11] = [
        SlideType::Title,
        SlideType::Problem,
        SlideType::Solution,
        SlideType::Benefits,
        SlideType::Implementation,
        SlideType::Framework,
        SlideType::Timeline,
        SlideType::Conclusion,
        SlideType::Chart,
        SlideType::Table,
        SlideType::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SlideType::Title => "title",
            SlideType::Problem => "problem",
            SlideType::Solution => "solution",
            SlideType::Benefits => "benefits",
            SlideType::Implementation => "implementation",
            SlideType::Framework => "framework",
            SlideType::Timeline => "timeline",
            SlideType::Conclusion => "conclusion",
            SlideType::Chart => "chart",
            SlideType::Table => "table",
            SlideType::Custom => "custom",
        }
    }

    /// Lenient parse of a model-supplied tag; unknown tags become `Custom`.
    pub fn parse(value: &str) -> Self {
        let v = value.trim().to_lowercase();
        SlideType::ALL
            .into_iter()
            .find(|t| t.as_str() == v)
            .unwrap_or(SlideType::Custom)
    }

    pub fn default_layout(self) -> Layout {
        match self {
            SlideType::Title => Layout::TitleOnly,
            SlideType::Solution => Layout::TitleContent,
            SlideType::Framework | SlideType::Implementation => Layout::Diagram,
            SlideType::Timeline => Layout::Timeline,
            SlideType::Chart => Layout::Chart,
            SlideType::Table => Layout::Table,
            SlideType::Problem | SlideType::Benefits | SlideType::Conclusion | SlideType::Custom => {
                Layout::BulletList
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    TitleOnly,
    TitleContent,
    TwoColumn,
    BulletList,
    Centered,
    Diagram,
    Metrics,
    Chart,
    Circle,
    Diamond,
    Table,
    Timeline,
}

impl Layout {
    pub const ALL: [Layout; 12] = [
        Layout::TitleOnly,
        Layout::TitleContent,
        Layout::TwoColumn,
        Layout::BulletList,
        Layout::Centered,
        Layout::Diagram,
        Layout::Metrics,
        Layout::Chart,
        Layout::Circle,
        Layout::Diamond,
        Layout::Table,
        Layout::Timeline,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Layout::TitleOnly => "title-only",
            Layout::TitleContent => "title-content",
            Layout::TwoColumn => "two-column",
            Layout::BulletList => "bullet-list",
            Layout::Centered => "centered",
            Layout::Diagram => "diagram",
            Layout::Metrics => "metrics",
            Layout::Chart => "chart",
            Layout::Circle => "circle",
            Layout::Diamond => "diamond",
            Layout::Table => "table",
            Layout::Timeline => "timeline",
        }
    }

    /// Accepts `two-column`, `two_column` and `twoColumn` spellings.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        Layout::ALL
            .into_iter()
            .find(|l| l.as_str().replace('-', "") == normalized)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleOnlyContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleContentBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, alias = "bullets", alias = "points")]
    pub bullet_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "points", alias = "bulletPoints")]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoColumnContent {
    #[serde(default, alias = "leftColumn")]
    pub left: Column,
    #[serde(default, alias = "rightColumn")]
    pub right: Column,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletListContent {
    #[serde(default, alias = "bullets", alias = "points")]
    pub bullet_points: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CenteredContent {
    #[serde(default, alias = "text", alias = "message")]
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supporting: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionsContent {
    #[serde(default, alias = "steps", alias = "quadrants")]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    #[serde(default, deserialize_with = "lenient::text")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsContent {
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Pie,
    Area,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "data")]
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartData {
    #[serde(default, alias = "type")]
    pub chart_type: ChartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "categories", deserialize_with = "lenient::text_list")]
    pub labels: Vec<String>,
    #[serde(default, alias = "datasets")]
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartContent {
    #[serde(default)]
    pub chart: ChartData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleContent {
    #[serde(default, alias = "centre", alias = "core")]
    pub center: String,
    #[serde(default, alias = "segments")]
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableData {
    #[serde(default, alias = "columns", deserialize_with = "lenient::text_list")]
    pub headers: Vec<String>,
    #[serde(default, deserialize_with = "lenient::rows")]
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableContent {
    #[serde(default)]
    pub table: TableData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventStatus {
    Completed,
    #[serde(alias = "in_progress", alias = "inProgress", alias = "current")]
    InProgress,
    #[default]
    #[serde(alias = "upcoming", alias = "pending")]
    Planned,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    #[serde(default, alias = "label", alias = "period", deserialize_with = "lenient::text")]
    pub date: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineContent {
    #[serde(default, alias = "milestones")]
    pub events: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", content = "content", rename_all = "kebab-case")]
pub enum SlideContent {
    TitleOnly(TitleOnlyContent),
    TitleContent(TitleContentBody),
    TwoColumn(TwoColumnContent),
    BulletList(BulletListContent),
    Centered(CenteredContent),
    Diagram(SectionsContent),
    Metrics(MetricsContent),
    Chart(ChartContent),
    Circle(CircleContent),
    Diamond(SectionsContent),
    Table(TableContent),
    Timeline(TimelineContent),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{layout} content is invalid: {reason}")]
pub struct ContentError {
    pub layout: &'static str,
    pub reason: String,
}

fn invalid(layout: Layout, reason: impl Into<String>) -> ContentError {
    ContentError {
        layout: layout.as_str(),
        reason: reason.into(),
    }
}

fn typed<T: serde::de::DeserializeOwned>(layout: Layout, value: &Value) -> Result<T, ContentError> {
    serde_json::from_value(value.clone()).map_err(|e| invalid(layout, e.to_string()))
}

impl SlideContent {
    pub fn layout(&self) -> Layout {
        match self {
            SlideContent::TitleOnly(_) => Layout::TitleOnly,
            SlideContent::TitleContent(_) => Layout::TitleContent,
            SlideContent::TwoColumn(_) => Layout::TwoColumn,
            SlideContent::BulletList(_) => Layout::BulletList,
            SlideContent::Centered(_) => Layout::Centered,
            SlideContent::Diagram(_) => Layout::Diagram,
            SlideContent::Metrics(_) => Layout::Metrics,
            SlideContent::Chart(_) => Layout::Chart,
            SlideContent::Circle(_) => Layout::Circle,
            SlideContent::Diamond(_) => Layout::Diamond,
            SlideContent::Table(_) => Layout::Table,
            SlideContent::Timeline(_) => Layout::Timeline,
        }
    }

    /// Parses a model-supplied `content` object for the declared layout,
    /// normalises what can be fixed deterministically and rejects the rest.
    pub fn from_value(layout: Layout, value: &Value) -> Result<Self, ContentError> {
        if !value.is_object() {
            return Err(invalid(layout, "content must be an object"));
        }
        let mut content = match layout {
            Layout::TitleOnly => SlideContent::TitleOnly(typed(layout, value)?),
            Layout::TitleContent => SlideContent::TitleContent(typed(layout, value)?),
            Layout::TwoColumn => SlideContent::TwoColumn(typed(layout, value)?),
            Layout::BulletList => SlideContent::BulletList(typed(layout, value)?),
            Layout::Centered => SlideContent::Centered(typed(layout, value)?),
            Layout::Diagram => SlideContent::Diagram(typed(layout, value)?),
            Layout::Metrics => SlideContent::Metrics(typed(layout, value)?),
            Layout::Chart => SlideContent::Chart(typed(layout, value)?),
            Layout::Circle => SlideContent::Circle(typed(layout, value)?),
            Layout::Diamond => SlideContent::Diamond(typed(layout, value)?),
            Layout::Table => SlideContent::Table(typed(layout, value)?),
            Layout::Timeline => SlideContent::Timeline(typed(layout, value)?),
        };
        content.normalize();
        content.check()?;
        Ok(content)
    }

    /// Pads or trims ragged table rows to the header width.
    fn normalize(&mut self) {
        if let SlideContent::Table(t) = self {
            let width = t.table.headers.len();
            if width == 0 {
                return;
            }
            t.table.rows.retain(|r| r.iter().any(|c| !c.trim().is_empty()));
            for row in &mut t.table.rows {
                row.resize(width, String::new());
            }
        }
    }

    /// Structural validity for the layout.
    pub fn check(&self) -> Result<(), ContentError> {
        let layout = self.layout();
        match self {
            SlideContent::TitleOnly(_) => Ok(()),
            SlideContent::TitleContent(c) => {
                let has_body = c.body.as_deref().is_some_and(|b| !b.trim().is_empty());
                if has_body || !c.bullet_points.is_empty() {
                    Ok(())
                } else {
                    Err(invalid(layout, "needs a body or bullet points"))
                }
            }
            SlideContent::TwoColumn(c) => {
                if c.left.items.is_empty() || c.right.items.is_empty() {
                    Err(invalid(layout, "both columns need items"))
                } else {
                    Ok(())
                }
            }
            SlideContent::BulletList(c) => {
                if c.bullet_points.is_empty() {
                    Err(invalid(layout, "no bullet points"))
                } else {
                    Ok(())
                }
            }
            SlideContent::Centered(c) => {
                if c.statement.trim().is_empty() {
                    Err(invalid(layout, "empty statement"))
                } else {
                    Ok(())
                }
            }
            SlideContent::Diagram(c) | SlideContent::Diamond(c) => {
                if c.sections.is_empty() {
                    Err(invalid(layout, "no sections"))
                } else if c.sections.iter().any(|s| s.title.trim().is_empty()) {
                    Err(invalid(layout, "section without a title"))
                } else {
                    Ok(())
                }
            }
            SlideContent::Metrics(c) => {
                if c.metrics.is_empty() {
                    Err(invalid(layout, "no metrics"))
                } else if c
                    .metrics
                    .iter()
                    .any(|m| m.label.trim().is_empty() || m.value.trim().is_empty())
                {
                    Err(invalid(layout, "metric without label or value"))
                } else {
                    Ok(())
                }
            }
            SlideContent::Chart(c) => {
                let chart = &c.chart;
                if chart.labels.is_empty() || chart.series.is_empty() {
                    return Err(invalid(layout, "chart needs labels and series"));
                }
                match chart
                    .series
                    .iter()
                    .find(|s| s.values.len() != chart.labels.len())
                {
                    Some(s) => Err(invalid(
                        layout,
                        format!(
                            "series '{}' has {} values for {} labels",
                            s.name,
                            s.values.len(),
                            chart.labels.len()
                        ),
                    )),
                    None => Ok(()),
                }
            }
            SlideContent::Circle(c) => {
                if c.center.trim().is_empty() || c.items.is_empty() {
                    Err(invalid(layout, "needs a center and items"))
                } else {
                    Ok(())
                }
            }
            SlideContent::Table(c) => {
                let width = c.table.headers.len();
                if width == 0 {
                    return Err(invalid(layout, "table has no headers"));
                }
                if c.table.rows.is_empty() {
                    return Err(invalid(layout, "table has no rows"));
                }
                if c.table.rows.iter().any(|r| r.len() != width) {
                    return Err(invalid(layout, "rows differ from header width"));
                }
                Ok(())
            }
            SlideContent::Timeline(c) => {
                if c.events.is_empty() {
                    Err(invalid(layout, "no events"))
                } else if c.events.iter().any(|e| e.title.trim().is_empty()) {
                    Err(invalid(layout, "event without a title"))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Every visible text fragment, in reading order.
    pub fn text_fragments(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        match self {
            SlideContent::TitleOnly(c) => out.extend(c.tagline.as_deref()),
            SlideContent::TitleContent(c) => {
                out.extend(c.body.as_deref());
                out.extend(c.bullet_points.iter().map(String::as_str));
                out.extend(c.callout.as_deref());
            }
            SlideContent::TwoColumn(c) => {
                for col in [&c.left, &c.right] {
                    out.push(&col.title);
                    out.extend(col.items.iter().map(String::as_str));
                }
            }
            SlideContent::BulletList(c) => out.extend(c.bullet_points.iter().map(String::as_str)),
            SlideContent::Centered(c) => {
                out.push(&c.statement);
                out.extend(c.supporting.as_deref());
            }
            SlideContent::Diagram(c) | SlideContent::Diamond(c) => {
                for s in &c.sections {
                    out.push(&s.title);
                    out.push(&s.description);
                    out.extend(s.items.iter().map(String::as_str));
                }
            }
            SlideContent::Metrics(c) => {
                for m in &c.metrics {
                    out.push(&m.label);
                    out.push(&m.value);
                    out.extend(m.description.as_deref());
                }
            }
            SlideContent::Chart(c) => {
                out.extend(c.chart.title.as_deref());
                out.extend(c.chart.labels.iter().map(String::as_str));
            }
            SlideContent::Circle(c) => {
                out.push(&c.center);
                out.extend(c.items.iter().map(String::as_str));
            }
            SlideContent::Table(c) => {
                out.extend(c.table.headers.iter().map(String::as_str));
                for row in &c.table.rows {
                    out.extend(row.iter().map(String::as_str));
                }
            }
            SlideContent::Timeline(c) => {
                for e in &c.events {
                    out.push(&e.date);
                    out.push(&e.title);
                    out.extend(e.description.as_deref());
                }
            }
        }
        out.retain(|s| !s.trim().is_empty());
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideMetadata {
    #[serde(default, deserialize_with = "lenient::text")]
    pub speaker_notes: String,
    #[serde(default = "default_duration", deserialize_with = "lenient::seconds")]
    pub estimated_duration_seconds: u32,
    #[serde(default = "default_audience_level", deserialize_with = "lenient::text")]
    pub audience_level: String,
}

fn default_duration() -> u32 {
    90
}

fn default_audience_level() -> String {
    "intermediate".to_string()
}

impl Default for SlideMetadata {
    fn default() -> Self {
        Self {
            speaker_notes: String::new(),
            estimated_duration_seconds: default_duration(),
            audience_level: default_audience_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: String,
    #[serde(rename = "type")]
    pub slide_type: SlideType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(flatten)]
    pub body: SlideContent,
    #[serde(default)]
    pub metadata: SlideMetadata,
}

impl Slide {
    pub fn layout(&self) -> Layout {
        self.body.layout()
    }
}
