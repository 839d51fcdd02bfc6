//! Local (no-API-key) provider, shaped after an Ollama-style `/api/generate`
//! backend.

use std::time::Instant;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::ProviderConfig;
use crate::contract::{parse_review_response, ReviewRequest, ReviewResponse};
use crate::errors::{LlmResult, ProviderError};
use crate::prompt::build_prompt;
use crate::providers::HealthStatus;

pub struct LocalProvider {
    client: reqwest::Client,
    cfg: ProviderConfig,
    url_generate: String,
    url_tags: String,
}

impl LocalProvider {
    pub fn new(cfg: ProviderConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(ProviderError::from_reqwest)?;
        let url_generate = format!("{}/api/generate", cfg.base_url);
        let url_tags = format!("{}/api/tags", cfg.base_url);
        Ok(Self {
            client,
            cfg,
            url_generate,
            url_tags,
        })
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    #[instrument(skip_all, fields(model = %self.cfg.model))]
    async fn generate_raw(&self, prompt: &str) -> LlmResult<(String, u32)> {
        let body = GenerateRequest {
            model: &self.cfg.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: self.cfg.max_tokens,
                temperature: self.cfg.temperature,
            },
        };
        debug!("POST {}", self.url_generate);
        let resp = self
            .client
            .post(&self.url_generate)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        if !resp.status().is_success() {
            return Err(status_error(resp.status(), resp.text().await.unwrap_or_default()).into());
        }

        let out: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        let tokens_used = out.eval_count.unwrap_or(0);
        Ok((out.response, tokens_used))
    }

    pub async fn review(&self, request: &ReviewRequest) -> LlmResult<ReviewResponse> {
        let started = Instant::now();
        let prompt = build_prompt(
            request.personality,
            &request.modes,
            request.extra_context.as_deref(),
            &request.diff_text,
        );
        let (raw, tokens_used) = self.generate_raw(&prompt).await?;
        let elapsed = started.elapsed().as_millis() as u64;
        Ok(parse_review_response(&request.file_path, &raw, tokens_used, elapsed))
    }

    pub async fn generate_commit_message(&self, diff: &str) -> LlmResult<String> {
        let prompt = format!(
            "Write a single concise commit message summarising this diff:\n\n{diff}"
        );
        let (text, _) = self.generate_raw(&prompt).await?;
        Ok(text.trim().to_string())
    }

    pub async fn generate_documentation(&self, diff: &str, context: &str) -> LlmResult<String> {
        let prompt = format!(
            "Write documentation for the change below. Context: {context}\n\n{diff}"
        );
        let (text, _) = self.generate_raw(&prompt).await?;
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
            .get(&self.url_tags)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;
        if !resp.status().is_success() {
            return Err(status_error(resp.status(), String::new()).into());
        }
        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;
        if tags.models.iter().any(|m| m.name == self.cfg.model) {
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
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}
