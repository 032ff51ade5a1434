use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::core::pipeline::{FrameworkStrategy, GenerationOptions, RefinementConfig, RetryPolicy};

pub const CONFIG_ENV: &str = "SLIDESMITH_CONFIG";
const LOCAL_CONFIG: &str = "slidesmith.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub refinement: RefinementSection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Empty means any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Falls back to the provider's default model.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub providers_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_strategy")]
    pub framework_strategy: FrameworkStrategy,
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default = "default_slide_retries")]
    pub slide_retries: u32,
    #[serde(default = "default_outline_retries")]
    pub outline_retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_min_slide_score")]
    pub min_slide_score: u8,
    #[serde(default = "default_quality_retries")]
    pub max_quality_retries: u32,
    #[serde(default = "default_true")]
    pub enable_validation: bool,
    #[serde(default = "default_true")]
    pub llm_rubric: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefinementSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_target_score")]
    pub target_quality_score: f64,
    #[serde(default = "default_rounds")]
    pub max_refinement_rounds: u32,
    #[serde(default = "default_min_improvement")]
    pub minimum_improvement: f64,
    #[serde(default = "default_slides_per_round")]
    pub max_slides_per_round: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    17980
}
fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_strategy() -> FrameworkStrategy {
    FrameworkStrategy::Heuristic
}
fn default_context_window() -> usize {
    2
}
fn default_slide_retries() -> u32 {
    2
}
fn default_outline_retries() -> u32 {
    1
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_min_slide_score() -> u8 {
    60
}
fn default_quality_retries() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_target_score() -> f64 {
    80.0
}
fn default_rounds() -> u32 {
    3
}
fn default_min_improvement() -> f64 {
    2.0
}
fn default_slides_per_round() -> usize {
    3
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            providers_file: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            framework_strategy: default_strategy(),
            context_window: default_context_window(),
            slide_retries: default_slide_retries(),
            outline_retries: default_outline_retries(),
            backoff_base_ms: default_backoff_ms(),
            min_slide_score: default_min_slide_score(),
            max_quality_retries: default_quality_retries(),
            enable_validation: true,
            llm_rubric: true,
        }
    }
}

impl Default for RefinementSection {
    fn default() -> Self {
        Self {
            enabled: true,
            target_quality_score: default_target_score(),
            max_refinement_rounds: default_rounds(),
            minimum_improvement: default_min_improvement(),
            max_slides_per_round: default_slides_per_round(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Resolves the config file (explicit path, `SLIDESMITH_CONFIG`,
    /// `./slidesmith.toml`, then the user config dir), parses it and applies
    /// environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let mut config = match resolve_path(explicit, &env) {
            Some(path) => Self::from_file(&path)?,
            None => {
                info!("No config file found, using defaults.");
                Self::default()
            }
        };
        config.apply_env(&env);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        info!(
            "Loaded config from {}: provider={}, strategy={:?}, refinement={}",
            path.display(),
            config.llm.provider,
            config.pipeline.framework_strategy,
            config.refinement.enabled
        );
        Ok(config)
    }

    pub fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        let set = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(key) = set("SLIDESMITH_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(provider) = set("SLIDESMITH_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(model) = set("SLIDESMITH_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(path) = set("SLIDESMITH_PROVIDERS_FILE") {
            self.llm.providers_file = Some(PathBuf::from(path));
        }
        if let Some(level) = set("SLIDESMITH_LOG") {
            self.logging.level = level;
        }
        if self.llm.api_key.is_none() {
            self.llm.api_key = set(&self.llm.api_key_env);
        }
    }

    /// Key used when a request carries none.
    pub fn server_api_key(&self) -> Option<String> {
        self.llm
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }

    pub fn generation_options(&self) -> GenerationOptions {
        let p = &self.pipeline;
        let backoff = Duration::from_millis(p.backoff_base_ms);
        let r = &self.refinement;
        GenerationOptions {
            framework_strategy: p.framework_strategy,
            enable_validation: p.enable_validation,
            llm_rubric: p.llm_rubric,
            min_slide_score: p.min_slide_score,
            max_quality_retries: p.max_quality_retries,
            context_window: p.context_window,
            outline_retry: RetryPolicy::linear(p.outline_retries, backoff),
            slide_retry: RetryPolicy::linear(p.slide_retries, backoff),
            refinement: r.enabled.then_some(RefinementConfig {
                target_quality_score: r.target_quality_score,
                max_refinement_rounds: r.max_refinement_rounds,
                minimum_improvement: r.minimum_improvement,
                max_slides_per_round: r.max_slides_per_round,
            }),
        }
    }
}

fn resolve_path(explicit: Option<&Path>, env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env(CONFIG_ENV).filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|d| d.join("slidesmith").join("config.toml"))
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_pipeline_defaults() {
        let options = AppConfig::default().generation_options();
        let expected = GenerationOptions::default();
        assert_eq!(options.min_slide_score, expected.min_slide_score);
        assert_eq!(options.context_window, expected.context_window);
        assert_eq!(options.slide_retry, expected.slide_retry);
        assert_eq!(options.outline_retry, expected.outline_retry);
        assert_eq!(options.refinement, expected.refinement);
        assert_eq!(options.framework_strategy, FrameworkStrategy::Heuristic);
    }

    #[test]
    fn parse_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
[server]
port = 9000

[pipeline]
framework_strategy = "analytical"
slide_retries = 4
backoff_base_ms = 10

[refinement]
enabled = false
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.provider, "anthropic");
        let options = config.generation_options();
        assert_eq!(options.framework_strategy, FrameworkStrategy::Analytical);
        assert_eq!(options.slide_retry, RetryPolicy::linear(4, Duration::from_millis(10)));
        assert!(options.refinement.is_none());
    }

    #[test]
    fn env_overrides_win_and_key_falls_back_to_named_variable() {
        let mut config = AppConfig::default();
        config.apply_env(&env_of(&[
            ("SLIDESMITH_MODEL", "gpt-4o-mini"),
            ("SLIDESMITH_PROVIDER", "openai"),
            ("ANTHROPIC_API_KEY", "sk-env"),
        ]));
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.server_api_key().as_deref(), Some("sk-env"));

        let mut config = AppConfig::default();
        config.llm.api_key = Some("from-file".to_string());
        config.apply_env(&env_of(&[("ANTHROPIC_API_KEY", "sk-env")]));
        assert_eq!(config.server_api_key().as_deref(), Some("from-file"));

        let mut config = AppConfig::default();
        config.apply_env(&env_of(&[("SLIDESMITH_API_KEY", "  ")]));
        assert!(config.server_api_key().is_none());
    }

    #[test]
    fn explicit_path_and_env_path_take_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        let resolved = resolve_path(Some(&path), &env_of(&[(CONFIG_ENV, "/nope.toml")]));
        assert_eq!(resolved.as_deref(), Some(path.as_path()));

        let env_path = path.display().to_string();
        let resolved = resolve_path(None, &env_of(&[(CONFIG_ENV, env_path.as_str())]));
        assert_eq!(resolved.as_deref(), Some(path.as_path()));

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn invalid_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();
        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("broken.toml"));
    }
}
