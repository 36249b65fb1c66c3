//! Discord event handling
//!
//! [`DiscordBot`] holds the channel rules and talks to the orchestrator;
//! [`DiscordEventHandler`] adapts serenity events onto it. Serenity runs
//! every event in its own task, so messages from different channels are
//! answered concurrently and the orchestrator keeps each channel in order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parlor_core::config::DiscordConfig;
use parlor_core::{ConversationId, ConversationOrchestrator};
use serenity::all::{
    ChannelId, Client, Context, EventHandler, GatewayIntents, GetMessages, Message, Ready,
};
use serenity::async_trait;
use tracing::{debug, error, info, warn};

use crate::error::{DiscordError, Result};
use crate::helpers::{
    DISCORD_MESSAGE_LIMIT, flatten_newlines, is_command, is_ignored_author, mentions_name,
    split_message,
};

/// Most messages Discord returns for one history request.
const MAX_BACKFILL: usize = 100;

#[derive(Debug, Clone)]
pub struct DiscordBot {
    orchestrator: Arc<ConversationOrchestrator>,
    config: DiscordConfig,
}

impl DiscordBot {
    pub fn new(orchestrator: Arc<ConversationOrchestrator>, config: DiscordConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    pub fn orchestrator(&self) -> &Arc<ConversationOrchestrator> {
        &self.orchestrator
    }

    pub fn config(&self) -> &DiscordConfig {
        &self.config
    }

    /// Configured bot token, if any.
    pub fn token(&self) -> Result<&str> {
        self.config
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(DiscordError::MissingToken)
    }

    /// An empty channel list means every channel the bot can see.
    pub fn listens_in(&self, channel: u64) -> bool {
        self.config.channels.is_empty() || self.config.channels.contains(&channel)
    }

    /// Whether a message gets an answer or is only recorded.
    pub fn wants_reply(&self, text: &str) -> bool {
        !self.config.mention || mentions_name(text, self.orchestrator.bot_name())
    }

    /// Run one incoming message through the orchestrator.
    ///
    /// Returns the reply to send, or `None` when the message was only
    /// recorded or the model had nothing to say.
    pub async fn handle_message(
        &self,
        channel: u64,
        speaker: &str,
        text: &str,
    ) -> Result<Option<String>> {
        let conversation = ConversationId::from(channel);
        let text = flatten_newlines(text);

        if !self.wants_reply(&text) {
            self.orchestrator
                .observe(&conversation, speaker, &text)
                .await?;
            return Ok(None);
        }

        let reply = self
            .orchestrator
            .reply(&conversation, speaker, &text)
            .await?;
        if reply.trim().is_empty() {
            debug!(%conversation, "Model returned an empty reply");
            return Ok(None);
        }
        Ok(Some(reply))
    }

    /// Record past messages, oldest first, without replying.
    ///
    /// Commands and blank messages are skipped. Stops at the first error,
    /// since it means the backend refuses every conversation. Returns how
    /// many lines were recorded.
    pub async fn backfill<I>(&self, channel: u64, messages: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let conversation = ConversationId::from(channel);
        let mut recorded = 0;
        for (speaker, text) in messages {
            if text.trim().is_empty() || is_command(&text) {
                continue;
            }
            let text = flatten_newlines(&text);
            if let Err(e) = self
                .orchestrator
                .observe(&conversation, &speaker, &text)
                .await
            {
                warn!(%conversation, error = %e, "History backfill stopped");
                break;
            }
            recorded += 1;
        }
        recorded
    }

    /// Connect to Discord and handle events until the client stops.
    pub async fn run(self) -> Result<()> {
        let token = self.token()?.to_string();
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        if self.config.channels.is_empty() {
            info!("Listening in every channel");
        } else {
            info!("Listening in channels: {:?}", self.config.channels);
        }

        let mut client = Client::builder(&token, intents)
            .event_handler(DiscordEventHandler::new(self))
            .await?;
        client.start().await?;
        Ok(())
    }
}

/// Name used for a message's author in history.
fn speaker_name(msg: &Message) -> String {
    msg.member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .unwrap_or_else(|| msg.author.display_name().to_string())
}

pub struct DiscordEventHandler {
    bot: DiscordBot,
    backfilled: AtomicBool,
}

impl DiscordEventHandler {
    pub fn new(bot: DiscordBot) -> Self {
        Self {
            bot,
            backfilled: AtomicBool::new(false),
        }
    }

    async fn backfill_channel(&self, ctx: &Context, channel: u64) -> Result<usize> {
        let limit = self.bot.config.backfill.min(MAX_BACKFILL) as u8;
        let messages = ChannelId::new(channel)
            .messages(&ctx.http, GetMessages::new().limit(limit))
            .await?;

        // newest first from the API
        let history = messages
            .iter()
            .rev()
            .map(|msg| (speaker_name(msg), msg.content_safe(&ctx.cache)))
            .collect::<Vec<_>>();
        Ok(self.bot.backfill(channel, history).await)
    }

    async fn send_reply(&self, ctx: &Context, msg: &Message, reply: &str) {
        for chunk in split_message(reply, DISCORD_MESSAGE_LIMIT) {
            if let Err(e) = msg.channel_id.say(&ctx.http, chunk).await {
                error!("Failed to send reply to {}: {}", msg.channel_id, e);
                break;
            }
        }
    }
}

#[async_trait]
impl EventHandler for DiscordEventHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("{} is connected to Discord", ready.user.name);

        // ready fires again after reconnects
        if self.bot.config.backfill == 0 || self.backfilled.swap(true, Ordering::SeqCst) {
            return;
        }
        for &channel in &self.bot.config.channels {
            if channel == 0 {
                continue;
            }
            match self.backfill_channel(&ctx, channel).await {
                Ok(recorded) => debug!("Backfilled {} messages from channel {}", recorded, channel),
                Err(e) => warn!("Could not read history of channel {}: {}", channel, e),
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let own_id = ctx.cache.current_user().id.get();
        if is_ignored_author(msg.author.id.get(), msg.author.bot, own_id) {
            return;
        }
        let channel = msg.channel_id.get();
        if !self.bot.listens_in(channel) {
            return;
        }

        let text = msg.content_safe(&ctx.cache);
        if text.trim().is_empty() || is_command(&text) {
            return;
        }
        let speaker = speaker_name(&msg);

        let typing = self
            .bot
            .wants_reply(&text)
            .then(|| msg.channel_id.start_typing(&ctx.http));

        let result = self.bot.handle_message(channel, &speaker, &text).await;
        drop(typing);

        match result {
            Ok(Some(reply)) => self.send_reply(&ctx, &msg, &reply).await,
            Ok(None) => {}
            Err(e) => warn!(
                "Could not handle message from {} in {}: {}",
                speaker, msg.channel_id, e
            ),
        }
    }
}
