//! KoboldAI `/api/v1/generate` backend.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{CompletionModel, GenerationParams, trim_base_url};
use crate::{CoreError, Result};

const NAME: &str = "kobold";

#[derive(Debug, Clone)]
pub struct KoboldBackend {
    base_url: String,
    params: GenerationParams,
    http: reqwest::Client,
}

impl KoboldBackend {
    pub fn new(base_url: &str, params: GenerationParams, http: reqwest::Client) -> Self {
        Self {
            base_url: trim_base_url(base_url),
            params,
            http,
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/v1/generate", self.base_url)
    }

    fn request_body(&self, prompt: &str, stop: &[String]) -> Value {
        json!({
            "prompt": prompt,
            "max_length": self.params.max_tokens,
            "temperature": self.params.temperature,
            "stop_sequence": stop,
        })
    }
}

#[async_trait]
impl CompletionModel for KoboldBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String> {
        let url = self.generate_url();
        debug!(%url, prompt_len = prompt.len(), "Sending kobold generate request");

        let response = self
            .http
            .post(&url)
            .json(&self.request_body(prompt, stop))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CoreError::generation(NAME, e))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| CoreError::generation(NAME, e))?;

        body.pointer("/results/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CoreError::UnexpectedResponseFormat {
                backend: NAME.to_string(),
                expected: "results[0].text".to_string(),
                body: body.to_string(),
            })
    }
}
