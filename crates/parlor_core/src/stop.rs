//! Stop sequences per conversation
//!
//! Every speaker seen in a conversation contributes a `"\n{name}:"` stop
//! token so the model ends its turn before it starts writing lines for
//! someone else.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::id::ConversationId;

/// Ordered, duplicate-free list of stop strings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopSet {
    sequences: Vec<String>,
}

impl StopSet {
    pub fn new<I, S>(sequences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        for sequence in sequences {
            set.insert(sequence);
        }
        set
    }

    /// Append `sequence` unless it is already present. Returns true if it was added.
    pub fn insert(&mut self, sequence: impl Into<String>) -> bool {
        let sequence = sequence.into();
        if self.contains(&sequence) {
            return false;
        }
        self.sequences.push(sequence);
        true
    }

    pub fn contains(&self, sequence: &str) -> bool {
        self.sequences.iter().any(|s| s == sequence)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.sequences
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Remove a stop sequence the model left at the end of `text`.
    ///
    /// Matching is an exact, case-sensitive suffix test against every entry;
    /// after a match trailing whitespace is stripped as well.
    pub fn trim_reply<'a>(&self, text: &'a str) -> &'a str {
        let mut text = text;
        for sequence in &self.sequences {
            if sequence.is_empty() {
                continue;
            }
            if let Some(stripped) = text.strip_suffix(sequence.as_str()) {
                text = stripped.trim_end();
            }
        }
        text
    }
}

/// The stop token that marks the start of `speaker`'s turn.
pub fn speaker_token(speaker: &str) -> String {
    format!("\n{speaker}:")
}

/// Stop sets keyed by conversation, seeded from a configured default list
#[derive(Debug)]
pub struct StopSequenceRegistry {
    defaults: StopSet,
    sets: Mutex<LruCache<ConversationId, StopSet>>,
}

impl StopSequenceRegistry {
    pub fn new(defaults: StopSet, capacity: NonZeroUsize) -> Self {
        Self {
            defaults,
            sets: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn defaults(&self) -> &StopSet {
        &self.defaults
    }

    /// Stop set for `conversation`, guaranteed to contain `speaker`'s token.
    ///
    /// Creates the conversation's set from the defaults on first use.
    pub fn resolve(&self, conversation: &ConversationId, speaker: &str) -> StopSet {
        let mut sets = self.sets.lock();
        let set = sets.get_or_insert_mut(conversation.clone(), || self.defaults.clone());
        if set.insert(speaker_token(speaker)) {
            tracing::debug!(%conversation, speaker, "Added speaker stop token");
        }
        set.clone()
    }

    /// Current stop set for `conversation` without creating one.
    pub fn peek(&self, conversation: &ConversationId) -> Option<StopSet> {
        self.sets.lock().peek(conversation).cloned()
    }

    pub fn len(&self) -> usize {
        self.sets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.lock().is_empty()
    }
}
