//! Parlor Core - conversation memory and inference plumbing
//!
//! This crate sits between chat messages and a text-completion endpoint:
//! it keeps a rolling, summarized memory per conversation, derives stop
//! sequences from the speakers it has seen, renders the instruction prompt
//! and talks to whichever backend protocol the endpoint turns out to speak.

pub mod config;
pub mod conversation;
pub mod error;
pub mod id;
pub mod memory;
pub mod model;
pub mod prompt_template;
pub mod stop;

#[cfg(test)]
pub mod test_helpers;

pub use config::ParlorConfig;
pub use conversation::ConversationOrchestrator;
pub use error::{ConfigError, CoreError, Result};
pub use id::ConversationId;
pub use memory::{ConversationMemoryStore, MemoryState};
pub use model::{BackendProtocol, CompletionModel, EndpointHandle, GenerationParams};
pub use prompt_template::PromptTemplate;
pub use stop::{StopSequenceRegistry, StopSet};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        CompletionModel, ConversationId, ConversationOrchestrator, CoreError, EndpointHandle,
        ParlorConfig, PromptTemplate, Result, StopSet,
    };
}
