//! Endpoint resolution
//!
//! The configured endpoint may speak either backend protocol. At startup
//! [`EndpointHandle::probe`] sends one trial completion per protocol, in
//! [`BackendProtocol::PROBE_ORDER`], and keeps the first that answers. The
//! outcome is stored once and never re-probed; a handle whose probe failed
//! rejects every request with `BackendUnavailable` without going to the
//! network.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    ChatCompletionsBackend, CompletionModel, GenerationParams, KoboldBackend,
    parlor_reqwest_client, trim_base_url,
};
use crate::{CoreError, Result};

/// Trial prompt used to check whether a protocol answers.
pub const PROBE_PROMPT: &str = "Question: What is the sum of 2 and 2?\nAnswer:";

/// Default request timeout for completions.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Wire protocols the endpoint may speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendProtocol {
    /// `POST /v1/chat/completions`
    ChatCompletions,
    /// `POST /api/v1/generate`
    KoboldGenerate,
}

impl BackendProtocol {
    pub const PROBE_ORDER: [BackendProtocol; 2] =
        [BackendProtocol::ChatCompletions, BackendProtocol::KoboldGenerate];
}

impl std::fmt::Display for BackendProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendProtocol::ChatCompletions => write!(f, "chat-completions"),
            BackendProtocol::KoboldGenerate => write!(f, "kobold"),
        }
    }
}

/// A backend bound to one protocol
#[derive(Debug, Clone)]
pub enum Backend {
    ChatCompletions(ChatCompletionsBackend),
    KoboldGenerate(KoboldBackend),
}

impl Backend {
    pub fn connect(
        protocol: BackendProtocol,
        base_url: &str,
        params: GenerationParams,
        http: reqwest::Client,
    ) -> Self {
        match protocol {
            BackendProtocol::ChatCompletions => {
                Backend::ChatCompletions(ChatCompletionsBackend::new(base_url, params, http))
            }
            BackendProtocol::KoboldGenerate => {
                Backend::KoboldGenerate(KoboldBackend::new(base_url, params, http))
            }
        }
    }

    pub fn protocol(&self) -> BackendProtocol {
        match self {
            Backend::ChatCompletions(_) => BackendProtocol::ChatCompletions,
            Backend::KoboldGenerate(_) => BackendProtocol::KoboldGenerate,
        }
    }

    pub async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String> {
        match self {
            Backend::ChatCompletions(backend) => backend.complete(prompt, stop).await,
            Backend::KoboldGenerate(backend) => backend.complete(prompt, stop).await,
        }
    }
}

#[derive(Debug)]
enum Resolution {
    Resolved(Backend),
    Unavailable,
}

/// The inference endpoint, shared read-only by every conversation once probed.
#[derive(Debug)]
pub struct EndpointHandle {
    base_url: String,
    params: GenerationParams,
    http: reqwest::Client,
    resolution: OnceLock<Resolution>,
}

impl EndpointHandle {
    pub fn new(base_url: &str, params: GenerationParams) -> Self {
        Self::with_client(base_url, params, parlor_reqwest_client(DEFAULT_TIMEOUT))
    }

    pub fn with_client(base_url: &str, params: GenerationParams, http: reqwest::Client) -> Self {
        Self {
            base_url: trim_base_url(base_url),
            params,
            http,
            resolution: OnceLock::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The resolved protocol, if the probe found one.
    pub fn protocol(&self) -> Option<BackendProtocol> {
        match self.resolution.get() {
            Some(Resolution::Resolved(backend)) => Some(backend.protocol()),
            _ => None,
        }
    }

    /// Determine which protocol the endpoint speaks.
    ///
    /// Runs at most once per handle; later calls return the stored outcome.
    pub async fn probe(&self) -> Result<BackendProtocol> {
        if self.resolution.get().is_none() {
            let resolution = self.run_probe().await;
            // A concurrent probe may have won the race; either outcome is final.
            let _ = self.resolution.set(resolution);
        }

        match self.resolution.get() {
            Some(Resolution::Resolved(backend)) => Ok(backend.protocol()),
            Some(Resolution::Unavailable) => Err(self.unavailable()),
            None => Err(CoreError::BackendNotReady),
        }
    }

    async fn run_probe(&self) -> Resolution {
        for protocol in BackendProtocol::PROBE_ORDER {
            let backend =
                Backend::connect(protocol, &self.base_url, self.params, self.http.clone());
            match backend.complete(PROBE_PROMPT, &[]).await {
                Ok(_) => {
                    info!(endpoint = %self.base_url, %protocol, "Inference endpoint resolved");
                    return Resolution::Resolved(backend);
                }
                Err(e) => {
                    warn!(
                        endpoint = %self.base_url,
                        %protocol,
                        error = %e,
                        "Endpoint probe failed"
                    );
                }
            }
        }
        warn!(endpoint = %self.base_url, "No backend protocol answered the probe");
        Resolution::Unavailable
    }

    fn unavailable(&self) -> CoreError {
        CoreError::BackendUnavailable {
            endpoint: self.base_url.clone(),
        }
    }
}

#[async_trait]
impl CompletionModel for EndpointHandle {
    fn name(&self) -> &str {
        match self.resolution.get() {
            Some(Resolution::Resolved(Backend::ChatCompletions(backend))) => backend.name(),
            Some(Resolution::Resolved(Backend::KoboldGenerate(backend))) => backend.name(),
            _ => "unresolved",
        }
    }

    fn ready(&self) -> Result<()> {
        match self.resolution.get() {
            Some(Resolution::Resolved(_)) => Ok(()),
            Some(Resolution::Unavailable) => Err(self.unavailable()),
            None => Err(CoreError::BackendNotReady),
        }
    }

    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String> {
        match self.resolution.get() {
            Some(Resolution::Resolved(backend)) => backend.complete(prompt, stop).await,
            Some(Resolution::Unavailable) => Err(self.unavailable()),
            None => Err(CoreError::BackendNotReady),
        }
    }
}
