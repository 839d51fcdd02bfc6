//! Remote (API-key-required) provider, shaped after an OpenAI-style
//! `/v1/chat/completions` backend. Fails fast at construction if no
//! credential is configured — a remote call with no key can never succeed.

use std::time::Instant;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::contract::{parse_review_response, ReviewRequest, ReviewResponse};
use crate::errors::{LlmResult, ProviderError};
use crate::prompt::build_prompt;
use crate::providers::HealthStatus;

pub struct RemoteProvider {
    client: reqwest::Client,
    cfg: ProviderConfig,
    api_key: String,
    url_chat: String,
    url_models: String,
}

impl RemoteProvider {
    pub fn new(cfg: ProviderConfig) -> LlmResult<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or(ProviderError::MissingCredential("API_KEY"))?;
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .gzip(true)
            .build()
            .map_err(ProviderError::from_reqwest)?;
        let url_chat = format!("{}/v1/chat/completions", cfg.base_url);
        let url_models = format!("{}/v1/models", cfg.base_url);
        Ok(Self {
            client,
            cfg,
            api_key,
            url_chat,
            url_models,
        })
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    #[instrument(skip_all, fields(model = %self.cfg.model))]
    async fn chat_raw(&self, prompt: &str) -> LlmResult<(String, u32)> {
        let body = ChatRequest {
            model: &self.cfg.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
        };
        debug!("POST {}", self.url_chat);
        let resp = self
            .client
            .post(&self.url_chat)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        if !resp.status().is_success() {
            return Err(status_error(resp.status(), resp.text().await.unwrap_or_default()).into());
        }

        let out: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        let content = out
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        let tokens_used = out.usage.map(|u| u.total_tokens).unwrap_or(0);
        Ok((content, tokens_used))
    }

    pub async fn review(&self, request: &ReviewRequest) -> LlmResult<ReviewResponse> {
        let started = Instant::now();
        let prompt = build_prompt(
            request.personality,
            &request.modes,
            request.extra_context.as_deref(),
            &request.diff_text,
        );
        let (raw, tokens_used) = self.chat_raw(&prompt).await?;
        let elapsed = started.elapsed().as_millis() as u64;
        Ok(parse_review_response(&request.file_path, &raw, tokens_used, elapsed))
    }

    pub async fn generate_commit_message(&self, diff: &str) -> LlmResult<String> {
        let prompt = format!("Write a single concise commit message summarising this diff:\n\n{diff}");
        let (text, _) = self.chat_raw(&prompt).await?;
        Ok(text.trim().to_string())
    }

    pub async fn generate_documentation(&self, diff: &str, context: &str) -> LlmResult<String> {
        let prompt = format!("Write documentation for the change below. Context: {context}\n\n{diff}");
        let (text, _) = self.chat_raw(&prompt).await?;
        Ok(text)
    }

    pub async fn health_check(&self) -> HealthStatus {
        let started = Instant::now();
        match self.try_health().await {
            Ok(()) => HealthStatus {
                provider: self.cfg.name.clone(),
                endpoint: self.cfg.base_url.clone(),
                model: self.cfg.model.clone(),
                ok: true,
                latency_ms: started.elapsed().as_millis() as u64,
                message: "ok".to_string(),
            },
            Err(e) => HealthStatus {
                provider: self.cfg.name.clone(),
                endpoint: self.cfg.base_url.clone(),
                model: self.cfg.model.clone(),
                ok: false,
                latency_ms: started.elapsed().as_millis() as u64,
                message: e.to_string(),
            },
        }
    }

    async fn try_health(&self) -> LlmResult<()> {
        let resp = self
            .client
            .get(&self.url_models)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), String::new()).into());
        }
        let models: ModelsResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        if models.data.iter().any(|m| m.id == self.cfg.model) {
            Ok(())
        } else {
            Err(ProviderError::Decode(format!("model {} not present", self.cfg.model)).into())
        }
    }
}

fn status_error(status: StatusCode, body: String) -> ProviderError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ProviderError::RateLimited {
            retry_after_secs: None,
        };
    }
    if status.is_server_error() {
        return ProviderError::Server(status);
    }
    ProviderError::HttpStatus {
        status,
        snippet: body.chars().take(240).collect(),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageOwned,
}

#[derive(Deserialize)]
struct ChatMessageOwned {
    content: String,
}

#[derive(Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_fails_construction() {
        let cfg = ProviderConfig {
            name: "openai".into(),
            model: "gpt-4".into(),
            base_url: "https://api.openai.com".into(),
            api_key: None,
            timeout: std::time::Duration::from_secs(30),
            max_tokens: 512,
            temperature: 0.2,
            rate_limit: 2.0,
        };
        assert!(RemoteProvider::new(cfg).is_err());
    }
}
