pub mod generic_provider;
#[cfg(test)]
pub mod mock;
pub mod registry;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use self::generic_provider::GenericProvider;
use self::registry::ProviderRegistry;

/// One text-completion call against a provider.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: Option<String>,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u64,
}

/// Model settings for one kind of call (outline, slide, review...).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ModelConfig {
    pub fn new(model: &str, max_tokens: u32, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    pub fn request(&self, system: Option<&str>, prompt: String) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: system.map(str::to_string),
            prompt,
        }
    }
}

/// Per-call model presets derived from the configured model id.
#[derive(Debug, Clone)]
pub struct ModelProfile {
    pub framework: ModelConfig,
    pub outline: ModelConfig,
    pub slide: ModelConfig,
    pub review: ModelConfig,
}

impl ModelProfile {
    pub fn for_model(model: &str) -> Self {
        Self {
            framework: ModelConfig::new(model, 500, 0.3),
            outline: ModelConfig::new(model, 4000, 0.7),
            slide: ModelConfig::new(model, 2000, 0.7),
            review: ModelConfig::new(model, 1000, 0.2),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("{provider} API error ({status}): {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },
    #[error("LLM request timed out")]
    Timeout,
    #[error("LLM transport error: {0}")]
    Transport(String),
    #[error("LLM returned an empty completion")]
    EmptyCompletion,
}

impl LlmError {
    /// HTTP status to surface to the caller once retries are exhausted.
    pub fn status(&self) -> u16 {
        match self {
            LlmError::Provider { status, .. } => *status,
            LlmError::Timeout => 504,
            LlmError::Transport(_) | LlmError::EmptyCompletion => 502,
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;
}

/// Builds a provider for one generation request from the resolved API key.
pub trait ProviderFactory: Send + Sync {
    fn build(&self, api_key: &str) -> Result<Arc<dyn LlmProvider>>;

    /// Model used when the config does not name one.
    fn default_model(&self) -> Option<String> {
        None
    }
}

pub struct RegistryProviderFactory {
    registry: ProviderRegistry,
    provider_id: String,
    timeout_secs: u64,
}

impl RegistryProviderFactory {
    pub fn new(registry: ProviderRegistry, provider_id: &str, timeout_secs: u64) -> Self {
        Self {
            registry,
            provider_id: provider_id.to_string(),
            timeout_secs,
        }
    }
}

impl ProviderFactory for RegistryProviderFactory {
    fn build(&self, api_key: &str) -> Result<Arc<dyn LlmProvider>> {
        let def = self
            .registry
            .get_provider(&self.provider_id)
            .ok_or_else(|| anyhow::anyhow!("Unknown provider '{}'", self.provider_id))?;
        info!("Using LLM provider: {} ({})", def.name, def.id);
        Ok(Arc::new(GenericProvider::new(
            def.clone(),
            api_key.to_string(),
            self.timeout_secs,
        )?))
    }

    fn default_model(&self) -> Option<String> {
        self.registry
            .get_provider(&self.provider_id)
            .map(|def| def.default_model.clone())
    }
}

pub(crate) fn estimate_tokens_from_chars(char_count: usize) -> u64 {
    (char_count as u64).div_ceil(4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_maps_each_error_kind() {
        let provider = LlmError::Provider {
            provider: "Anthropic".to_string(),
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(provider.status(), 429);
        assert_eq!(LlmError::Timeout.status(), 504);
        assert_eq!(LlmError::Transport("reset".to_string()).status(), 502);
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens_from_chars(0), 0);
        assert_eq!(estimate_tokens_from_chars(5), 2);
        assert_eq!(estimate_tokens_from_chars(8), 2);
    }

    #[test]
    fn factory_rejects_unknown_provider() {
        let factory = RegistryProviderFactory::new(ProviderRegistry::load(), "nope", 30);
        assert!(factory.build("key").is_err());
        assert_eq!(factory.default_model(), None);
    }

    #[test]
    fn factory_reports_registry_default_model() {
        let factory = RegistryProviderFactory::new(ProviderRegistry::load(), "openai", 30);
        assert_eq!(factory.default_model().as_deref(), Some("gpt-4o"));
    }
}
