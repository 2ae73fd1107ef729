use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::Oracle;
use super::types::{Message, OracleResponse};
use crate::errors::ChainscanError;

/// OpenAI-compatible chat-completions provider. Also serves local endpoints
/// (llama.cpp, vLLM, Ollama) through a base-URL override.
pub struct OpenAiOracle {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
}

impl OpenAiOracle {
    pub fn new(api_key: &str, model: Option<&str>, max_tokens: u32) -> Self {
        Self::with_base_url(api_key, model, "https://api.openai.com/v1", max_tokens)
    }

    pub fn with_base_url(api_key: &str, model: Option<&str>, base_url: &str, max_tokens: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            model: model.unwrap_or("gpt-4o").to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens,
        }
    }
}

#[async_trait]
impl Oracle for OpenAiOracle {
    async fn complete(&self, messages: &[Message]) -> Result<OracleResponse, ChainscanError> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ChainscanError::Timeout(format!("oracle request timed out: {}", e))
                } else {
                    ChainscanError::Network(format!("oracle request failed: {}", e))
                }
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ChainscanError::RateLimit("oracle rate limit".into()));
        }
        if status.as_u16() == 401 {
            return Err(ChainscanError::Authentication("invalid oracle API key".into()));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| ChainscanError::OracleApi(format!("failed to parse oracle response: {}", e)))?;

        if let Some(error) = data.get("error") {
            return Err(ChainscanError::OracleApi(
                error["message"].as_str().unwrap_or("Unknown").to_string(),
            ));
        }

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        let input_tokens = data["usage"]["prompt_tokens"].as_u64();
        let output_tokens = data["usage"]["completion_tokens"].as_u64();

        Ok(OracleResponse {
            content,
            input_tokens,
            output_tokens,
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
