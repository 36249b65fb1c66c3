//! Text-completion backends
//!
//! Everything that talks to the inference endpoint goes through
//! [`CompletionModel`]. The two wire protocols live in their own modules and
//! are tied together by [`EndpointHandle`], which picks one at startup.

mod chat_completions;
pub mod endpoint;
mod kobold;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use chat_completions::ChatCompletionsBackend;
pub use endpoint::{Backend, BackendProtocol, EndpointHandle, PROBE_PROMPT};
pub use kobold::KoboldBackend;

/// A plain prompt-in, text-out completion service.
#[async_trait]
pub trait CompletionModel: Send + Sync + fmt::Debug {
    /// Short name used in logs and error messages
    fn name(&self) -> &str;

    /// Whether the model can take requests right now.
    ///
    /// Handles that are resolved at runtime report `BackendNotReady` or
    /// `BackendUnavailable` here without touching the network.
    fn ready(&self) -> Result<()> {
        Ok(())
    }

    /// Complete `prompt`, asking the backend to stop at any of `stop`.
    ///
    /// An empty string is a valid completion; failures are always `Err`.
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String>;
}

/// Sampling parameters sent with every completion request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 800,
            temperature: 0.7,
        }
    }
}

/// Build the HTTP client shared by both backend protocols.
pub fn parlor_reqwest_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("parlor/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .expect("TLS backend failed to initialize") // same failure mode as Client::new()
}

fn trim_base_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
