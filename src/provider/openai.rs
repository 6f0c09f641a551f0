use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{classify_status, require_key, transport_error, Provider};
use crate::errors::ProviderError;
use crate::wire::{GenerateOptions, Instruction};

pub const DEFAULT_BASE: &str = "https://api.openai.com";

/// OpenAI chat-completions backend with JSON-object response mode.
pub struct OpenAIProvider {
    model: String,
    api_key: String,
    api_base: String,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(client: Client, model: String, api_key: String, api_base: String) -> Self {
        Self { model, api_key, api_base, client }
    }

    fn request_body(&self, req: &Instruction, opts: &GenerateOptions) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": req.system },
                { "role": "user", "content": req.user }
            ],
            "temperature": opts.temperature,
            "max_tokens": opts.max_output_tokens,
        });
        if opts.structured_output {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[async_trait]
impl Provider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, req: &Instruction, opts: &GenerateOptions) -> Result<String, ProviderError> {
        require_key("openai", &self.api_key)?;
        let url = format!("{}/v1/chat/completions", self.api_base.trim_end_matches('/'));
        let body = self.request_body(req, opts);

        tracing::debug!(%url, model = %self.model, "openai: POST");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("openai", e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| transport_error("openai", e))?;
        tracing::debug!(%status, bytes = text.len(), "openai: response received");

        if !status.is_success() {
            return Err(classify_status("openai", status, &text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Backend(format!("failed to parse OpenAI envelope: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::NoContent)
    }
}
