use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;

use super::MemoryState;
use crate::Result;
use crate::id::ConversationId;
use crate::model::CompletionModel;

/// Memory of one conversation behind its own async lock.
///
/// Holding the lock across the model call is what keeps exchanges for the
/// same conversation in arrival order.
pub type SharedMemory = Arc<tokio::sync::Mutex<MemoryState>>;

/// Bounded map from conversation to memory
///
/// Conversations are evicted least-recently-used once `capacity` is
/// reached. An evicted conversation that is mid-exchange finishes on its own
/// handle; the next message for it starts from empty memory.
#[derive(Debug)]
pub struct ConversationMemoryStore {
    model: Arc<dyn CompletionModel>,
    token_budget: usize,
    conversations: Mutex<LruCache<ConversationId, SharedMemory>>,
}

impl ConversationMemoryStore {
    pub fn new(
        model: Arc<dyn CompletionModel>,
        token_budget: usize,
        capacity: NonZeroUsize,
    ) -> Self {
        Self {
            model,
            token_budget,
            conversations: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The model used for summarization (and, by the orchestrator, for replies)
    pub fn model(&self) -> &Arc<dyn CompletionModel> {
        &self.model
    }

    pub fn token_budget(&self) -> usize {
        self.token_budget
    }

    /// Memory for `conversation`, created empty on first use.
    ///
    /// Fails with `BackendNotReady`/`BackendUnavailable` while the model
    /// cannot summarize, so no memory is created against a dead backend.
    pub fn get_or_create(&self, conversation: &ConversationId) -> Result<SharedMemory> {
        self.model.ready()?;
        let mut conversations = self.conversations.lock();
        let memory = conversations.get_or_insert(conversation.clone(), || {
            debug!(%conversation, budget = self.token_budget, "Creating conversation memory");
            Arc::new(tokio::sync::Mutex::new(MemoryState::new(self.token_budget)))
        });
        Ok(memory.clone())
    }

    /// Existing memory for `conversation`; never creates one.
    pub fn peek(&self, conversation: &ConversationId) -> Option<SharedMemory> {
        self.conversations.lock().peek(conversation).cloned()
    }

    pub async fn append_exchange(
        &self,
        conversation: &ConversationId,
        input: impl Into<String>,
        response: impl Into<String>,
    ) -> Result<()> {
        let memory = self.get_or_create(conversation)?;
        let mut state = memory.lock().await;
        state.push_exchange(self.model.as_ref(), input, response).await
    }

    pub async fn append_input_only(
        &self,
        conversation: &ConversationId,
        input: impl Into<String>,
    ) -> Result<()> {
        let memory = self.get_or_create(conversation)?;
        memory.lock().await.push_input_only(input);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.conversations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CoreError;
    use crate::test_helpers::model::MockModel;
    use pretty_assertions::assert_eq;

    fn store(model: Arc<MockModel>, budget: usize) -> ConversationMemoryStore {
        ConversationMemoryStore::new(model, budget, NonZeroUsize::new(4).unwrap())
    }

    #[tokio::test]
    async fn budget_holds_after_every_exchange() {
        let model = Arc::new(MockModel::replying("summary"));
        let store = store(model.clone(), 10);
        let channel = ConversationId::from(7u64);

        for i in 0..20 {
            store
                .append_exchange(&channel, format!("Bob: message {i}"), format!("Ava: reply {i}"))
                .await
                .unwrap();
            let memory = store.peek(&channel).unwrap();
            let state = memory.lock().await;
            assert!(state.buffered_tokens() <= state.token_budget());
        }
        assert!(model.calls() > 0);
    }

    #[tokio::test]
    async fn input_only_never_calls_the_model() {
        let model = Arc::new(MockModel::replying("summary"));
        let store = store(model.clone(), 1);
        let channel = ConversationId::from("lurk");

        for i in 0..10 {
            store
                .append_input_only(&channel, format!("Bob: passing remark number {i}"))
                .await
                .unwrap();
        }

        assert_eq!(model.calls(), 0);
        let memory = store.peek(&channel).unwrap();
        assert_eq!(memory.lock().await.lines().count(), 10);
    }

    #[tokio::test]
    async fn conversations_are_independent() {
        let model = Arc::new(MockModel::replying("summary"));
        let store = store(model, 100);
        let a = ConversationId::from("a");
        let b = ConversationId::from("b");

        store.append_exchange(&a, "Bob: a", "Ava: a").await.unwrap();
        store.append_input_only(&b, "Cy: b").await.unwrap();

        let a_history = store.peek(&a).unwrap().lock().await.history();
        let b_history = store.peek(&b).unwrap().lock().await.history();
        assert_eq!(a_history, "Bob: a\nAva: a");
        assert_eq!(b_history, "Cy: b");
    }

    #[tokio::test]
    async fn peek_never_creates_memory() {
        let store = store(Arc::new(MockModel::replying("s")), 10);
        assert!(store.peek(&ConversationId::from("ghost")).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn unready_backend_refuses_new_memory() {
        let store = store(Arc::new(MockModel::not_ready()), 10);
        let result = store.get_or_create(&ConversationId::from("early"));
        assert!(matches!(result, Err(CoreError::BackendNotReady)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn capacity_evicts_least_recent() {
        let store = store(Arc::new(MockModel::replying("s")), 10);
        for id in ["a", "b", "c", "d"] {
            store.get_or_create(&ConversationId::from(id)).unwrap();
        }
        // touch "a" so "b" becomes the oldest
        store.get_or_create(&ConversationId::from("a")).unwrap();
        store.get_or_create(&ConversationId::from("e")).unwrap();

        assert_eq!(store.len(), 4);
        assert!(store.peek(&ConversationId::from("a")).is_some());
        assert!(store.peek(&ConversationId::from("b")).is_none());
    }
}
