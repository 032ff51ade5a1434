use std::fmt::Write as _;

use anyhow::Result;

use crate::core::deck::{EventStatus, PresentationData, Slide, SlideContent};

use super::ExportSink;

/// One `##` section per slide, followed by its speaker notes as a quote.
pub struct MarkdownExporter;

impl ExportSink for MarkdownExporter {
    fn format(&self) -> &'static str {
        "markdown"
    }

    fn content_type(&self) -> &'static str {
        "text/markdown; charset=utf-8"
    }

    fn export(&self, deck: &PresentationData) -> Result<Vec<u8>> {
        let mut out = String::new();
        writeln!(out, "# {}", deck.title)?;
        if let Some(subtitle) = &deck.subtitle {
            writeln!(out, "\n_{}_", subtitle)?;
        }
        if let Some(description) = &deck.description {
            writeln!(out, "\n{}", description)?;
        }
        let meta = &deck.metadata;
        writeln!(
            out,
            "\n{} slides, about {} min. Framework: {}. Audience: {}.",
            deck.slides.len(),
            meta.estimated_duration_minutes,
            meta.framework,
            meta.audience.as_deref().unwrap_or("general")
        )?;

        for (i, slide) in deck.slides.iter().enumerate() {
            out.push_str("\n---\n\n");
            render_slide(&mut out, i + 1, slide)?;
        }
        Ok(out.into_bytes())
    }
}

fn bullets(out: &mut String, items: &[String]) -> std::fmt::Result {
    for item in items {
        writeln!(out, "- {}", item)?;
    }
    Ok(())
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn render_slide(out: &mut String, number: usize, slide: &Slide) -> std::fmt::Result {
    writeln!(out, "## {}. {}", number, slide.title)?;
    if let Some(subtitle) = &slide.subtitle {
        writeln!(out, "\n_{}_", subtitle)?;
    }
    out.push('\n');

    match &slide.body {
        SlideContent::TitleOnly(c) => {
            if let Some(tagline) = &c.tagline {
                writeln!(out, "_{}_", tagline)?;
            }
        }
        SlideContent::TitleContent(c) => {
            if let Some(body) = &c.body {
                writeln!(out, "{}\n", body)?;
            }
            bullets(out, &c.bullet_points)?;
            if let Some(callout) = &c.callout {
                writeln!(out, "\n**{}**", callout)?;
            }
        }
        SlideContent::TwoColumn(c) => {
            for column in [&c.left, &c.right] {
                writeln!(out, "### {}\n", column.title)?;
                bullets(out, &column.items)?;
                out.push('\n');
            }
        }
        SlideContent::BulletList(c) => bullets(out, &c.bullet_points)?,
        SlideContent::Centered(c) => {
            writeln!(out, "**{}**", c.statement)?;
            if let Some(supporting) = &c.supporting {
                writeln!(out, "\n{}", supporting)?;
            }
        }
        SlideContent::Diagram(c) | SlideContent::Diamond(c) => {
            for section in &c.sections {
                writeln!(out, "### {}\n", section.title)?;
                if !section.description.is_empty() {
                    writeln!(out, "{}\n", section.description)?;
                }
                bullets(out, &section.items)?;
            }
        }
        SlideContent::Metrics(c) => {
            for m in &c.metrics {
                write!(out, "- **{}**: {}", m.label, m.value)?;
                if let Some(trend) = &m.trend {
                    write!(out, " ({})", trend)?;
                }
                if let Some(description) = &m.description {
                    write!(out, " - {}", description)?;
                }
                out.push('\n');
            }
        }
        SlideContent::Chart(c) => {
            let chart = &c.chart;
            writeln!(
                out,
                "Chart ({:?}){}\n",
                chart.chart_type,
                chart.title.as_deref().map(|t| format!(": {}", t)).unwrap_or_default()
            )?;
            let mut headers = vec!["Series".to_string()];
            headers.extend(chart.labels.iter().map(|l| cell(l)));
            table_row(out, &headers)?;
            table_row(out, &vec!["---".to_string(); headers.len()])?;
            for series in &chart.series {
                let mut row = vec![cell(&series.name)];
                row.extend(series.values.iter().map(|v| v.to_string()));
                table_row(out, &row)?;
            }
        }
        SlideContent::Circle(c) => {
            writeln!(out, "**{}**\n", c.center)?;
            bullets(out, &c.items)?;
        }
        SlideContent::Table(c) => {
            let headers: Vec<String> = c.table.headers.iter().map(|h| cell(h)).collect();
            table_row(out, &headers)?;
            table_row(out, &vec!["---".to_string(); headers.len()])?;
            for row in &c.table.rows {
                table_row(out, &row.iter().map(|v| cell(v)).collect::<Vec<_>>())?;
            }
        }
        SlideContent::Timeline(c) => {
            for event in &c.events {
                let mark = match event.status {
                    EventStatus::Completed => "[x]",
                    EventStatus::InProgress => "[~]",
                    EventStatus::Planned => "[ ]",
                };
                write!(out, "- {} **{}** {}", mark, event.date, event.title)?;
                if let Some(description) = &event.description {
                    write!(out, ": {}", description)?;
                }
                out.push('\n');
            }
        }
    }

    let notes = slide.metadata.speaker_notes.trim();
    if !notes.is_empty() {
        out.push('\n');
        for line in notes.lines() {
            writeln!(out, "> {}", line)?;
        }
    }
    Ok(())
}

fn table_row(out: &mut String, cells: &[String]) -> std::fmt::Result {
    writeln!(out, "| {} |", cells.join(" | "))
}
