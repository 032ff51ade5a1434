use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::registry::{ApiFormat, AuthType, ProviderDef};
use super::{Completion, CompletionRequest, LlmError, LlmProvider, estimate_tokens_from_chars};

// ── OpenAI-compatible request/response ──

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessageOwned,
}

#[derive(Deserialize)]
struct OpenAiMessageOwned {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    total_tokens: u64,
}

// ── Anthropic Messages request/response ──

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<OpenAiMessage<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

// ── Generic Provider ──

pub struct GenericProvider {
    provider_def: ProviderDef,
    api_key: String,
    client: Client,
}

impl GenericProvider {
    pub fn new(provider_def: ProviderDef, api_key: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            provider_def,
            api_key,
            client,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = match self.provider_def.auth.auth_type {
            AuthType::Bearer => request.header("Authorization", format!("Bearer {}", self.api_key)),
            AuthType::Header => {
                let name = self
                    .provider_def
                    .auth
                    .header_name
                    .as_deref()
                    .unwrap_or("x-api-key");
                request.header(name, &self.api_key)
            }
        };
        for (k, v) in &self.provider_def.extra_headers {
            request = request.header(k.as_str(), v.as_str());
        }
        request
    }

    async fn send<T: Serialize>(&self, body: &T) -> Result<reqwest::Response, LlmError> {
        let request = self.authorize(self.client.post(&self.provider_def.base_url).json(body));
        let res = request.send().await.map_err(map_transport)?;
        if !res.status().is_success() {
            let status = res.status().as_u16();
            return Err(LlmError::Provider {
                provider: self.provider_def.name.clone(),
                status,
                message: res.text().await.unwrap_or_default(),
            });
        }
        Ok(res)
    }

    async fn complete_openai(&self, req: &CompletionRequest) -> Result<Completion, LlmError> {
        let mut messages = Vec::new();
        if let Some(system) = req.system.as_deref() {
            messages.push(OpenAiMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(OpenAiMessage {
            role: "user",
            content: &req.prompt,
        });

        let body = OpenAiRequest {
            model: &req.model,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            messages,
        };
        let parsed: OpenAiResponse = self.send(&body).await?.json().await.map_err(map_transport)?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let tokens_used = parsed
            .usage
            .map(|u| u.total_tokens)
            .unwrap_or_else(|| estimate_usage(req, &text));
        finish(text, tokens_used)
    }

    async fn complete_anthropic(&self, req: &CompletionRequest) -> Result<Completion, LlmError> {
        let body = AnthropicRequest {
            model: &req.model,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
            system: req.system.as_deref(),
            messages: vec![OpenAiMessage {
                role: "user",
                content: &req.prompt,
            }],
        };
        let parsed: AnthropicResponse =
            self.send(&body).await?.json().await.map_err(map_transport)?;
        let text = parsed
            .content
            .into_iter()
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
        let tokens_used = parsed
            .usage
            .map(|u| u.input_tokens + u.output_tokens)
            .unwrap_or_else(|| estimate_usage(req, &text));
        finish(text, tokens_used)
    }
}

fn map_transport(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Transport(e.to_string())
    }
}

fn estimate_usage(req: &CompletionRequest, response_text: &str) -> u64 {
    let input_chars = req.prompt.chars().count()
        + req.system.as_deref().map(|s| s.chars().count()).unwrap_or(0);
    estimate_tokens_from_chars(input_chars) + estimate_tokens_from_chars(response_text.chars().count())
}

fn finish(text: String, tokens_used: u64) -> Result<Completion, LlmError> {
    if text.trim().is_empty() {
        return Err(LlmError::EmptyCompletion);
    }
    Ok(Completion { text, tokens_used })
}

#[async_trait]
impl LlmProvider for GenericProvider {
    fn provider_id(&self) -> &str {
        &self.provider_def.id
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        match self.provider_def.api_format {
            ApiFormat::Openai => self.complete_openai(request).await,
            ApiFormat::Anthropic => self.complete_anthropic(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_usage_counts_system_and_prompt() {
        let req = CompletionRequest {
            model: "m".to_string(),
            max_tokens: 10,
            temperature: 0.0,
            system: Some("abcd".to_string()),
            prompt: "abcdef".to_string(),
        };
        // ceil(10 / 4) + ceil(8 / 4)
        assert_eq!(estimate_usage(&req, "abcdefgh"), 5);
    }

    #[test]
    fn blank_completion_is_an_error() {
        assert!(matches!(
            finish("   ".to_string(), 3),
            Err(LlmError::EmptyCompletion)
        ));
        assert_eq!(finish("ok".to_string(), 3).unwrap().tokens_used, 3);
    }
}
