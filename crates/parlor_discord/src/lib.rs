//! Parlor Discord - Discord Bot Integration
//!
//! Connects a [`ConversationOrchestrator`](parlor_core::ConversationOrchestrator)
//! to Discord: one conversation per channel, replies split to fit Discord's
//! message limit, and recent history recorded when the bot comes online.
//!
//! ## Configuration
//!
//! The bot takes `parlor_core::config::DiscordConfig` as loaded at startup.
//! There are no runtime environment variable reads in this crate.

pub mod bot;
pub mod error;
pub mod helpers;

pub use bot::{DiscordBot, DiscordEventHandler};
pub use error::{DiscordError, Result};

// Re-export serenity for convenience
pub use serenity;
