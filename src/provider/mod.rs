use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::cli::ProviderKind;
use crate::config::Config;
use crate::errors::ProviderError;
use crate::wire::{GenerateOptions, Instruction};

pub mod anthropic;
pub mod ollama;
pub mod openai;

/// A text-generation backend. Returns the model's raw text; no retries.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, req: &Instruction, opts: &GenerateOptions) -> Result<String, ProviderError>;
}

pub type DynProvider = Arc<dyn Provider>;

pub fn make_provider(cfg: &Config) -> Result<DynProvider> {
    let client = Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .context("building HTTP client")?;
    let api_key = cfg.api_key.clone().unwrap_or_default();

    let provider: DynProvider = match cfg.provider {
        ProviderKind::OpenAI => Arc::new(openai::OpenAIProvider::new(
            client,
            cfg.model.clone(),
            api_key,
            cfg.api_base.clone().unwrap_or_else(|| openai::DEFAULT_BASE.into()),
        )),
        ProviderKind::Anthropic => Arc::new(anthropic::Anthropic::new(
            client,
            cfg.model.clone(),
            api_key,
            cfg.api_base.clone().unwrap_or_else(|| anthropic::DEFAULT_BASE.into()),
        )),
        ProviderKind::Ollama => Arc::new(ollama::Ollama::new(
            client,
            cfg.model.clone(),
            cfg.api_base.clone().unwrap_or_else(|| ollama::DEFAULT_URL.into()),
        )),
    };
    Ok(provider)
}

/// Map a non-success HTTP status to the backend error taxonomy.
pub(crate) fn classify_status(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let detail = format!("{provider} returned {status}: {}", truncate(body, 500));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Config(detail),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => ProviderError::RateLimited(detail),
        s if s.as_u16() == 529 => ProviderError::RateLimited(detail),
        _ => ProviderError::Backend(detail),
    }
}

pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Backend(format!("{provider} request timed out"))
    } else {
        ProviderError::Backend(format!("{provider} request failed: {e}"))
    }
}

pub(crate) fn require_key(provider: &str, key: &str) -> Result<(), ProviderError> {
    if key.trim().is_empty() {
        Err(ProviderError::Config(format!("{provider} API key is not set")))
    } else {
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
