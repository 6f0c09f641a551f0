use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{classify_status, require_key, transport_error, Provider};
use crate::errors::ProviderError;
use crate::wire::{GenerateOptions, Instruction};

pub const DEFAULT_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct Anthropic {
    pub model: String,
    pub api_key: String,
    pub api_base: String,
    client: Client,
}

impl Anthropic {
    pub fn new(client: Client, model: String, api_key: String, api_base: String) -> Self {
        Self { model, api_key, api_base, client }
    }
}

#[derive(Serialize)]
struct MsgRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Msg<'a>>,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MsgResponse {
    #[serde(default)]
    content: Vec<Block>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    text: String,
    #[serde(default)]
    r#type: String,
}

// No native JSON mode: the system prompt already demands a bare object, so
// structured_output has nothing extra to toggle here.
fn build_request<'a>(model: &'a str, req: &'a Instruction, opts: &GenerateOptions) -> MsgRequest<'a> {
    MsgRequest {
        model,
        max_tokens: opts.max_output_tokens,
        temperature: opts.temperature.min(1.0),
        system: &req.system,
        messages: vec![Msg { role: "user", content: &req.user }],
    }
}

#[async_trait]
impl Provider for Anthropic {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(&self, req: &Instruction, opts: &GenerateOptions) -> Result<String, ProviderError> {
        require_key("anthropic", &self.api_key)?;
        let url = format!("{}/v1/messages", self.api_base.trim_end_matches('/'));
        let body = build_request(&self.model, req, opts);

        tracing::debug!(%url, model = %self.model, "anthropic: POST");

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("anthropic", e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| transport_error("anthropic", e))?;
        tracing::debug!(%status, bytes = text.len(), "anthropic: response received");

        if !status.is_success() {
            return Err(classify_status("anthropic", status, &text));
        }

        let parsed: MsgResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Backend(format!("anthropic response parse error: {e}")))?;

        let content: String = parsed
            .content
            .into_iter()
            .filter(|b| b.r#type == "text")
            .map(|b| b.text)
            .collect();

        if content.trim().is_empty() {
            Err(ProviderError::NoContent)
        } else {
            Ok(content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keeps_system_separate() {
        let req = Instruction { system: "sys".into(), user: "usr".into() };
        let body = serde_json::to_value(build_request("claude", &req, &GenerateOptions::default())).unwrap();
        assert_eq!(body["system"], "sys");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "usr");
        assert_eq!(body["max_tokens"], 2000);
    }

    #[test]
    fn temperature_is_clamped_to_api_range() {
        let req = Instruction { system: String::new(), user: String::new() };
        let opts = GenerateOptions { temperature: 1.4, ..GenerateOptions::default() };
        assert_eq!(build_request("m", &req, &opts).temperature, 1.0);
    }
}
