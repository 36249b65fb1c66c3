use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::model::CompletionModel;
use crate::{CoreError, Result};

/// Rough token count for budget accounting: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Build the request that folds `new_lines` into `summary`.
pub fn summarization_prompt(summary: &str, new_lines: &str) -> String {
    let summary = if summary.is_empty() { "(none yet)" } else { summary };
    format!(
        "Progressively summarize the conversation below. Extend the current summary \
         with the new lines and reply with the updated summary only.\n\n\
         Current summary:\n{summary}\n\n\
         New lines of conversation:\n{new_lines}\n\n\
         New summary:"
    )
}

/// Rolling memory of one conversation: a model-written summary of older
/// turns plus the most recent lines verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryState {
    summary: String,
    buffer: VecDeque<BufferedLine>,
    buffered_tokens: usize,
    token_budget: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BufferedLine {
    text: String,
    tokens: usize,
}

impl MemoryState {
    pub fn new(token_budget: usize) -> Self {
        Self {
            summary: String::new(),
            buffer: VecDeque::new(),
            buffered_tokens: 0,
            token_budget,
        }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Buffered lines, oldest first
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.buffer.iter().map(|line| line.text.as_str())
    }

    pub fn buffered_tokens(&self) -> usize {
        self.buffered_tokens
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    pub fn is_over_budget(&self) -> bool {
        self.buffered_tokens > self.token_budget
    }

    /// History as fed into the prompt: the summary as a system line, then
    /// the buffered lines.
    pub fn history(&self) -> String {
        let mut lines: Vec<&str> = Vec::with_capacity(self.buffer.len() + 1);
        let summary_line;
        if !self.summary.is_empty() {
            summary_line = format!("System: {}", self.summary);
            lines.push(&summary_line);
        }
        lines.extend(self.lines());
        lines.join("\n")
    }

    /// Record a line without generating anything.
    ///
    /// Never calls the model. Overflow from input-only lines is folded on the
    /// next [`push_exchange`](Self::push_exchange).
    pub fn push_input_only(&mut self, line: impl Into<String>) {
        self.push_line(line.into());
    }

    /// Record an input/response pair and fold overflow into the summary.
    ///
    /// If summarization fails the lines stay buffered (over budget), the
    /// summary is untouched and `GenerationFailed` is returned.
    pub async fn push_exchange(
        &mut self,
        model: &dyn CompletionModel,
        input: impl Into<String>,
        response: impl Into<String>,
    ) -> Result<()> {
        self.push_line(input.into());
        self.push_line(response.into());
        self.fold_overflow(model).await
    }

    /// Summarize the oldest lines until the buffer fits the budget.
    pub async fn fold_overflow(&mut self, model: &dyn CompletionModel) -> Result<()> {
        let count = self.overflow_len();
        if count == 0 {
            return Ok(());
        }

        let new_lines = self
            .buffer
            .iter()
            .take(count)
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        debug!(
            lines = count,
            buffered_tokens = self.buffered_tokens,
            budget = self.token_budget,
            "Folding conversation lines into summary"
        );

        let prompt = summarization_prompt(&self.summary, &new_lines);
        let summary = match model.complete(&prompt, &[]).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Summarization failed, keeping buffer over budget");
                return Err(match e {
                    e @ CoreError::GenerationFailed { .. } => e,
                    other => CoreError::generation(model.name(), format!("summarization: {other}")),
                });
            }
        };

        for _ in 0..count {
            if let Some(line) = self.buffer.pop_front() {
                self.buffered_tokens -= line.tokens;
            }
        }
        self.summary = summary.trim().to_string();
        Ok(())
    }

    fn push_line(&mut self, text: String) {
        let tokens = estimate_tokens(&text);
        self.buffered_tokens += tokens;
        self.buffer.push_back(BufferedLine { text, tokens });
    }

    /// How many lines from the front must go for the rest to fit the budget.
    fn overflow_len(&self) -> usize {
        let mut remaining = self.buffered_tokens;
        let mut count = 0;
        for line in &self.buffer {
            if remaining <= self.token_budget {
                break;
            }
            remaining -= line.tokens;
            count += 1;
        }
        count
    }
}
