//! Turn handling between chat messages and the completion model
//!
//! One incoming message runs through: resolve memory and stop set, format
//! the input line, render the prompt, await the model, trim the reply, write
//! the exchange back into memory. The conversation's memory lock is held for
//! the whole sequence, so messages for one conversation are applied strictly
//! in arrival order while other conversations proceed in parallel.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::Result;
use crate::config::MemoryConfig;
use crate::id::ConversationId;
use crate::memory::ConversationMemoryStore;
use crate::model::CompletionModel;
use crate::prompt_template::PromptTemplate;
use crate::stop::{StopSequenceRegistry, StopSet};

/// A chat line as it appears in history: `"{speaker}: {text}"`.
pub fn format_line(speaker: &str, text: &str) -> String {
    format!("{speaker}: {text}")
}

#[derive(Debug)]
pub struct ConversationOrchestrator {
    bot_name: String,
    template: PromptTemplate,
    memory: ConversationMemoryStore,
    stops: StopSequenceRegistry,
}

impl ConversationOrchestrator {
    pub fn new(
        bot_name: impl Into<String>,
        template: PromptTemplate,
        model: Arc<dyn CompletionModel>,
        default_stops: StopSet,
        memory: &MemoryConfig,
    ) -> Self {
        let capacity = NonZeroUsize::new(memory.max_conversations).unwrap_or(NonZeroUsize::MIN);
        Self {
            bot_name: bot_name.into(),
            template,
            memory: ConversationMemoryStore::new(model, memory.token_budget, capacity),
            stops: StopSequenceRegistry::new(default_stops, capacity),
        }
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    pub fn memory(&self) -> &ConversationMemoryStore {
        &self.memory
    }

    pub fn stops(&self) -> &StopSequenceRegistry {
        &self.stops
    }

    /// Generate the bot's reply to `text` from `speaker`.
    ///
    /// Lines recorded by [`observe`](Self::observe) since the last reply are
    /// folded into the summary first, so the prompt's history fits the
    /// budget. On a model error nothing is written to memory and the error
    /// is returned as is; there are no retries. A failed summarization is
    /// only logged, the reply still goes out.
    pub async fn reply(
        &self,
        conversation: &ConversationId,
        speaker: &str,
        text: &str,
    ) -> Result<String> {
        let memory = self.memory.get_or_create(conversation)?;
        let mut state = memory.lock().await;
        let stop = self.stops.resolve(conversation, speaker);
        let model = self.memory.model();

        // work on a copy so a failed completion leaves memory as it was
        let mut next = state.clone();
        if next.is_over_budget() {
            if let Err(e) = next.fold_overflow(model.as_ref()).await {
                warn!(%conversation, error = %e, "Observed backlog not summarized");
            }
        }

        let input = format_line(speaker, text);
        let prompt = self.template.render(&next.history(), &input);
        debug!(
            %conversation,
            speaker,
            prompt_len = prompt.len(),
            "Requesting completion"
        );

        let raw = model.complete(&prompt, stop.as_slice()).await?;
        let reply = stop.trim_reply(&raw).to_string();

        let response = format_line(&self.bot_name, &reply);
        if let Err(e) = next.push_exchange(model.as_ref(), input, response).await {
            warn!(%conversation, error = %e, "Conversation summary not updated");
        }
        *state = next;

        Ok(reply)
    }

    /// Record `text` from `speaker` without replying.
    ///
    /// Never calls the model; any overflow is folded by the next
    /// [`reply`](Self::reply).
    pub async fn observe(
        &self,
        conversation: &ConversationId,
        speaker: &str,
        text: &str,
    ) -> Result<()> {
        let memory = self.memory.get_or_create(conversation)?;
        let mut state = memory.lock().await;
        self.stops.resolve(conversation, speaker);
        state.push_input_only(format_line(speaker, text));
        debug!(%conversation, speaker, "Recorded input-only line");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;
    use crate::memory::estimate_tokens;
    use crate::test_helpers::model::MockModel;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    fn orchestrator(model: Arc<MockModel>) -> ConversationOrchestrator {
        ConversationOrchestrator::new(
            "Ava",
            PromptTemplate::instruction("You are {{char}}.", "Ava"),
            model,
            StopSet::new(["###"]),
            &MemoryConfig::default(),
        )
    }

    #[tokio::test]
    async fn reply_trims_stop_suffix_and_records_exchange() {
        let model = Arc::new(MockModel::replying("Hello there\nUser:"));
        let bot = orchestrator(model.clone());
        let channel = ConversationId::from(1u64);

        let reply = bot.reply(&channel, "User", "hi").await.unwrap();

        assert_eq!(reply, "Hello there");
        assert_eq!(
            model.prompts()[0],
            "### Instruction:\nYou are Ava.\n\nUser: hi\n### Response:\nAva:"
        );
        assert_eq!(model.stops()[0], ["###".to_string(), "\nUser:".to_string()]);

        let history = bot.memory().peek(&channel).unwrap().lock().await.history();
        assert_eq!(history, "User: hi\nAva: Hello there");
    }

    #[tokio::test]
    async fn history_feeds_the_next_prompt() {
        let model = Arc::new(MockModel::replying("ok"));
        let bot = orchestrator(model.clone());
        let channel = ConversationId::from("c");

        bot.observe(&channel, "Bob", "anyone here?").await.unwrap();
        bot.reply(&channel, "Cy", "Ava, hi").await.unwrap();

        assert_eq!(model.calls(), 1);
        assert!(model.prompts()[0].contains("Bob: anyone here?\nCy: Ava, hi\n### Response:"));
        assert!(model.stops()[0].contains(&"\nBob:".to_string()));
    }

    #[tokio::test]
    async fn failed_generation_leaves_memory_untouched() {
        let model = Arc::new(MockModel::replying("fine").then([Err("boom")]));
        let bot = orchestrator(model.clone());
        let channel = ConversationId::from("c");
        bot.observe(&channel, "Bob", "before").await.unwrap();

        let result = bot.reply(&channel, "Bob", "hello?").await;

        assert!(matches!(result, Err(CoreError::GenerationFailed { .. })));
        let history = bot.memory().peek(&channel).unwrap().lock().await.history();
        assert_eq!(history, "Bob: before");
    }

    #[tokio::test]
    #[traced_test]
    async fn summarization_failure_still_returns_reply() {
        let model = Arc::new(MockModel::failing().then([Ok("a reply that is long enough")]));
        let bot = ConversationOrchestrator::new(
            "Ava",
            PromptTemplate::instruction("p", "Ava"),
            model.clone(),
            StopSet::default(),
            &MemoryConfig {
                token_budget: 1,
                ..MemoryConfig::default()
            },
        );
        let channel = ConversationId::from("c");

        let reply = bot.reply(&channel, "Bob", "tell me something").await.unwrap();

        assert_eq!(reply, "a reply that is long enough");
        assert_eq!(model.calls(), 2);
        let memory = bot.memory().peek(&channel).unwrap();
        let state = memory.lock().await;
        assert_eq!(state.summary(), "");
        assert_eq!(state.lines().count(), 2);
        assert!(logs_contain("Conversation summary not updated"));
    }

    #[tokio::test]
    async fn observed_backlog_is_summarized_before_the_prompt() {
        let model = Arc::new(MockModel::replying("ok"));
        let bot = ConversationOrchestrator::new(
            "Ava",
            PromptTemplate::instruction("p", "Ava"),
            model.clone(),
            StopSet::default(),
            &MemoryConfig {
                token_budget: 10,
                ..MemoryConfig::default()
            },
        );
        let channel = ConversationId::from("busy");
        for i in 0..200 {
            bot.observe(&channel, "Bob", &format!("line {i}")).await.unwrap();
        }
        assert_eq!(model.calls(), 0);

        bot.reply(&channel, "Cy", "Ava?").await.unwrap();

        let prompts = model.prompts();
        assert!(prompts[0].contains("Bob: line 0"));
        let reply_prompt = &prompts[1];
        assert!(!reply_prompt.contains("Bob: line 0\n"));
        let history = reply_prompt
            .strip_prefix("### Instruction:\np\n")
            .and_then(|rest| rest.strip_suffix("\nCy: Ava?\n### Response:\nAva:"))
            .unwrap();
        let buffered: usize = history
            .lines()
            .filter(|line| !line.starts_with("System: "))
            .map(estimate_tokens)
            .sum();
        assert!(buffered <= 10, "history over budget: {history:?}");
        assert!(history.starts_with("System: ok"));

        let memory = bot.memory().peek(&channel).unwrap();
        let state = memory.lock().await;
        assert!(state.buffered_tokens() <= state.token_budget());
    }

    #[tokio::test]
    async fn failed_reply_discards_backlog_summary() {
        let model = Arc::new(MockModel::failing().then([Ok("summary"), Err("boom")]));
        let bot = ConversationOrchestrator::new(
            "Ava",
            PromptTemplate::instruction("p", "Ava"),
            model.clone(),
            StopSet::default(),
            &MemoryConfig {
                token_budget: 4,
                ..MemoryConfig::default()
            },
        );
        let channel = ConversationId::from("c");
        bot.observe(&channel, "Bob", "one two three").await.unwrap();
        bot.observe(&channel, "Bob", "four five six").await.unwrap();

        let result = bot.reply(&channel, "Cy", "hi").await;

        assert!(matches!(result, Err(CoreError::GenerationFailed { .. })));
        let memory = bot.memory().peek(&channel).unwrap();
        let state = memory.lock().await;
        assert_eq!(state.summary(), "");
        assert_eq!(state.lines().count(), 2);
    }

    #[tokio::test]
    async fn observe_never_calls_the_model() {
        let model = Arc::new(MockModel::replying("unused"));
        let bot = orchestrator(model.clone());
        for i in 0..50 {
            bot.observe(&ConversationId::from("lurk"), "Bob", &format!("line {i}"))
                .await
                .unwrap();
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn messages_for_one_conversation_apply_in_order() {
        let model = Arc::new(MockModel::replying("ok"));
        let bot = Arc::new(orchestrator(model.clone()));
        let channel = ConversationId::from("busy");

        let mut handles = Vec::new();
        for i in 0..5 {
            let bot = bot.clone();
            let channel = channel.clone();
            handles.push(tokio::spawn(async move {
                bot.reply(&channel, "Bob", &format!("n{i}")).await
            }));
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let memory = bot.memory().peek(&channel).unwrap();
        let state = memory.lock().await;
        let inputs: Vec<_> = state.lines().filter(|l| l.starts_with("Bob:")).collect();
        assert_eq!(inputs.len(), 5);
        // every exchange is an adjacent input/reply pair
        let lines: Vec<_> = state.lines().collect();
        for pair in lines.chunks(2) {
            assert!(pair[0].starts_with("Bob: n"));
            assert_eq!(pair[1], "Ava: ok");
        }
    }
}
