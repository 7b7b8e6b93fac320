use async_trait::async_trait;
use simo_config::LlmConfig;
use simo_core::{Result, SimoError};
use tracing::{debug, info};

use crate::llm::LlmCall;

/// OpenAI-compatible chat-completions client (OpenAI, Azure, vLLM, Ollama...).
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            model,
        }
    }

    /// Use a custom base URL (Azure, a local vLLM server, etc.)
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Build from `[nlu.llm]`. Returns `None` when the fallback is disabled.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SimoError::Config("nlu.llm.enabled is set but no api_key".into()))?;
        info!(model = %config.model, base_url = %config.base_url, "llm fallback enabled");
        Ok(Some(
            Self::new(api_key, config.model.clone()).with_base_url(config.base_url.clone()),
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, system: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "model": &self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": text },
            ],
        })
    }
}

#[async_trait]
impl LlmCall for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn call(&self, system: &str, text: &str) -> Result<String> {
        let body = self.request_body(system, text);

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| SimoError::Llm(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SimoError::Llm(format!("HTTP {status}: {text}")));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SimoError::Llm(e.to_string()))?;

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();
        debug!(model = %self.model, chars = content.len(), "llm replied");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_system_and_user() {
        let client = OpenAiClient::new("k".into(), "gpt-4o-mini".into());
        let body = client.request_body("sys", "前进");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "前进");
        assert_eq!(body["model"], "gpt-4o-mini");
    }

    #[test]
    fn disabled_config_builds_nothing() {
        assert!(OpenAiClient::from_config(&LlmConfig::default()).unwrap().is_none());
        let missing_key = LlmConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(OpenAiClient::from_config(&missing_key).is_err());
    }
}
