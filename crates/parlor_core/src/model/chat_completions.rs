//! OpenAI-compatible `/v1/chat/completions` backend (LM Studio, text-generation-webui).

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::{CompletionModel, GenerationParams, trim_base_url};
use crate::{CoreError, Result};

const NAME: &str = "chat-completions";

#[derive(Debug, Clone)]
pub struct ChatCompletionsBackend {
    base_url: String,
    params: GenerationParams,
    http: reqwest::Client,
}

impl ChatCompletionsBackend {
    pub fn new(base_url: &str, params: GenerationParams, http: reqwest::Client) -> Self {
        Self {
            base_url: trim_base_url(base_url),
            params,
            http,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Request body; `stop` is only sent when there is something to stop on.
    fn request_body(&self, prompt: &str, stop: &[String]) -> Value {
        let mut body = json!({
            "messages": [{ "role": "user", "content": prompt }],
            "preset": "None",
            "do_sample": true,
            "temperature": self.params.temperature,
            "max_tokens": self.params.max_tokens,
        });
        if !stop.is_empty() {
            body["stop"] = json!(stop);
        }
        body
    }
}

#[async_trait]
impl CompletionModel for ChatCompletionsBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String> {
        let url = self.completions_url();
        debug!(%url, prompt_len = prompt.len(), "Sending chat completion request");

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

        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CoreError::UnexpectedResponseFormat {
                backend: NAME.to_string(),
                expected: "choices[0].message.content".to_string(),
                body: body.to_string(),
            })
    }
}
