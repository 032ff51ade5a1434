use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tokio_util::sync::CancellationToken;

use crate::core::config::AppConfig;
use crate::core::deck::{PresentationRequest, PresentationType, Tone};
use crate::core::export::exporter_for;
use crate::core::llm::registry::ProviderRegistry;
use crate::core::llm::{ModelProfile, ProviderFactory, RegistryProviderFactory};
use crate::core::pipeline::{
    GenerationContext, GenerationProgress, IterativeGenerationResult, IterativeOrchestrator,
    PipelineError,
};
use crate::core::terminal::{self, print_status, print_step, print_success, print_warn};
use crate::logging;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GenerateArgs {
    pub prompt: String,
    pub presentation_type: String,
    pub slides: String,
    pub audience: Option<String>,
    pub tone: Option<String>,
    pub out: Option<PathBuf>,
    pub format: String,
    pub verbose: bool,
}

impl Default for GenerateArgs {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            presentation_type: "business".to_string(),
            slides: "8".to_string(),
            audience: None,
            tone: None,
            out: None,
            format: "json".to_string(),
            verbose: false,
        }
    }
}

impl GenerateArgs {
    pub fn to_request(&self) -> Result<PresentationRequest> {
        let presentation_type = PresentationType::parse(&self.presentation_type)
            .ok_or_else(|| anyhow!("Unknown presentation type '{}'", self.presentation_type))?;
        let slide_count: usize = self
            .slides
            .trim()
            .parse()
            .with_context(|| format!("--slides '{}' is not a number", self.slides))?;
        let tone = match self.tone.as_deref() {
            Some(raw) => Tone::parse(raw).ok_or_else(|| anyhow!("Unknown tone '{}'", raw))?,
            None => Tone::default(),
        };
        Ok(PresentationRequest::new(
            &self.prompt,
            presentation_type,
            slide_count,
            self.audience.as_deref(),
            tone,
        )?)
    }

    /// `--format`, or the extension of `--out` when no format was given.
    pub fn export_format(&self) -> String {
        if self.format != "json" {
            return self.format.clone();
        }
        match self
            .out
            .as_deref()
            .and_then(Path::extension)
            .and_then(|e| e.to_str())
        {
            Some("md") | Some("markdown") => "markdown".to_string(),
            _ => self.format.clone(),
        }
    }
}

pub(crate) fn parse_generate_args(args: &[String], start: usize) -> GenerateArgs {
    let mut parsed = GenerateArgs::default();
    let mut i = start;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        let consumed = match (args[i].as_str(), value) {
            ("--prompt" | "-p", Some(v)) => {
                parsed.prompt = v;
                true
            }
            ("--type" | "-t", Some(v)) => {
                parsed.presentation_type = v;
                true
            }
            ("--slides" | "-n", Some(v)) => {
                parsed.slides = v;
                true
            }
            ("--audience", Some(v)) => {
                parsed.audience = Some(v);
                true
            }
            ("--tone", Some(v)) => {
                parsed.tone = Some(v);
                true
            }
            ("--out" | "-o", Some(v)) => {
                parsed.out = Some(PathBuf::from(v));
                true
            }
            ("--format" | "-f", Some(v)) => {
                parsed.format = v.to_lowercase();
                true
            }
            ("--verbose" | "-v", _) => {
                parsed.verbose = true;
                false
            }
            _ => false,
        };
        i += if consumed { 2 } else { 1 };
    }
    parsed
}

fn print_summary(result: &IterativeGenerationResult) {
    let Some(deck) = &result.presentation else {
        return;
    };
    let debug = &result.debug_info;
    print_success(&format!(
        "Generated '{}' ({} slides) in {} ms",
        deck.title,
        deck.slides.len(),
        result.processing_time_ms
    ));
    print_status(
        "Framework",
        &format!(
            "{} ({}, {:.0}% confidence)",
            debug.framework_selected,
            debug.framework_method,
            debug.framework_confidence * 100.0
        ),
    );
    if let Some(validation) = &result.validation_results
        && let Some(score) = validation.overall_score
    {
        let refined = validation
            .refinement
            .as_ref()
            .map(|r| format!(", {} refinement round(s), {}", r.rounds, r.termination))
            .unwrap_or_default();
        print_status("Quality", &format!("{}/100{}", score, refined));
    }
    print_status(
        "Usage",
        &format!("{} LLM calls, ~{} tokens", debug.llm_calls, debug.total_tokens),
    );
    for event in &debug.fallback_events {
        let slide = event
            .slide_number
            .map(|n| format!(" (slide {})", n))
            .unwrap_or_default();
        print_warn(&format!(
            "{}{}: {} [{}]",
            event.component, slide, event.reason, event.method
        ));
    }
}

pub async fn run(args: GenerateArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let level = if args.verbose {
        config.logging.level.as_str()
    } else {
        "warn"
    };
    logging::init(level, false);

    let request = args.to_request()?;
    let exporter = exporter_for(&args.export_format())?;
    let api_key = config
        .server_api_key()
        .ok_or(PipelineError::MissingApiKey)
        .with_context(|| format!("set {} or llm.api_key", config.llm.api_key_env))?;

    let registry = ProviderRegistry::load_with_overrides(config.llm.providers_file.as_deref())?;
    let factory = RegistryProviderFactory::new(
        registry,
        &config.llm.provider,
        config.llm.timeout_secs,
    );
    let model = match config.llm.model.clone().or_else(|| factory.default_model()) {
        Some(m) => m,
        None => bail!("No model configured for provider '{}'", config.llm.provider),
    };
    let provider = factory.build(&api_key)?;

    print_step(&format!(
        "Generating {} slides with {} ({})",
        request.slide_count, config.llm.provider, model
    ));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let generation_id = uuid::Uuid::new_v4().to_string();
    let ctx = GenerationContext::new(&generation_id)
        .with_cancellation(cancel)
        .with_progress(Arc::new(|p: &GenerationProgress| {
            terminal::print_progress(p.percent_complete, &p.message);
        }));
    let result = IterativeOrchestrator::new(provider, ModelProfile::for_model(&model))
        .generate_presentation(&request, &config.generation_options(), &ctx)
        .await;

    if !result.success {
        bail!("Generation failed: {}", result.errors.join("; "));
    }
    print_summary(&result);

    let deck = result
        .presentation
        .as_ref()
        .ok_or_else(|| anyhow!("Generation returned no presentation"))?;
    let bytes = exporter.export(deck)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!(
                "Wrote {} export to {}",
                exporter.format(),
                path.display()
            ));
        }
        None => println!("{}", String::from_utf8_lossy(&bytes)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_generate_args_reads_every_flag() {
        let args = argv(&[
            "slidesmith",
            "generate",
            "--prompt",
            "Cloud cost review",
            "--type",
            "technical",
            "--slides",
            "6",
            "--audience",
            "CFO",
            "--verbose",
            "--tone",
            "executive",
            "--out",
            "deck.md",
        ]);
        let parsed = parse_generate_args(&args, 2);
        assert_eq!(parsed.prompt, "Cloud cost review");
        assert_eq!(parsed.presentation_type, "technical");
        assert_eq!(parsed.slides, "6");
        assert_eq!(parsed.audience.as_deref(), Some("CFO"));
        assert_eq!(parsed.tone.as_deref(), Some("executive"));
        assert!(parsed.verbose);
        assert_eq!(parsed.export_format(), "markdown");

        let request = parsed.to_request().unwrap();
        assert_eq!(request.slide_count, 6);
        assert_eq!(request.tone, Tone::Executive);
    }

    #[test]
    fn defaults_apply_when_flags_are_missing() {
        let parsed = parse_generate_args(&argv(&["slidesmith", "generate", "-p", "x", "--type"]), 2);
        assert_eq!(parsed.presentation_type, "business");
        assert_eq!(parsed.slides, "8");
        assert_eq!(parsed.export_format(), "json");
        assert_eq!(parsed.to_request().unwrap().presentation_type, PresentationType::Business);
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut parsed = parse_generate_args(&argv(&["slidesmith", "generate", "-p", "x"]), 2);
        parsed.slides = "many".to_string();
        assert!(parsed.to_request().is_err());
        parsed.slides = "40".to_string();
        assert!(parsed.to_request().is_err());
        parsed.slides = "5".to_string();
        parsed.tone = Some("shouty".to_string());
        assert!(parsed.to_request().is_err());
    }
}
