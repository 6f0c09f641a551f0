use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{classify_status, transport_error, Provider};
use crate::errors::ProviderError;
use crate::wire::{GenerateOptions, Instruction};

pub const DEFAULT_URL: &str = "http://localhost:11434";

/// Local Ollama server; needs no credential.
pub struct Ollama {
    pub model: String,
    pub url: String,
    client: Client,
}

impl Ollama {
    pub fn new(client: Client, model: String, url: String) -> Self {
        Self { model, url, client }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<MsgOut>,
}

#[derive(Deserialize)]
struct MsgOut {
    #[serde(default)]
    content: String,
}

fn to_request<'a>(model: &'a str, ins: &'a Instruction, opts: &GenerateOptions) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![
            Msg { role: "system", content: &ins.system },
            Msg { role: "user", content: &ins.user },
        ],
        stream: false,
        format: opts.structured_output.then_some("json"),
        options: OllamaOptions {
            temperature: opts.temperature,
            num_predict: opts.max_output_tokens,
        },
    }
}

#[async_trait]
impl Provider for Ollama {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(&self, req: &Instruction, opts: &GenerateOptions) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.url.trim_end_matches('/'));
        let body = to_request(&self.model, req, opts);

        tracing::debug!(%url, model = %self.model, "ollama: POST");

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("ollama", e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| transport_error("ollama", e))?;
        tracing::debug!(%status, bytes = text.len(), "ollama: response received");

        if !status.is_success() {
            return Err(classify_status("ollama", status, &text));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Backend(format!("ollama response parse error: {e}")))?;

        parsed
            .message
            .map(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::NoContent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_format_follows_structured_flag() {
        let ins = Instruction { system: "s".into(), user: "u".into() };
        let on = serde_json::to_value(to_request("llama3", &ins, &GenerateOptions::default())).unwrap();
        assert_eq!(on["format"], "json");
        assert_eq!(on["stream"], false);
        assert_eq!(on["options"]["num_predict"], 2000);

        let opts = GenerateOptions { structured_output: false, ..GenerateOptions::default() };
        let off = serde_json::to_value(to_request("llama3", &ins, &opts)).unwrap();
        assert!(off.get("format").is_none());
    }
}
