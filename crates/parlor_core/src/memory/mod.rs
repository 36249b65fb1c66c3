//! Conversation memory
//!
//! Per-conversation rolling summaries with a verbatim buffer of recent lines,
//! kept in a bounded in-process store. Nothing here survives a restart.

mod state;
mod store;

pub use state::{MemoryState, estimate_tokens, summarization_prompt};
pub use store::{ConversationMemoryStore, SharedMemory};
