//! End-to-end conversation tests against a mocked inference endpoint.

use std::sync::Arc;

use parlor_core::config::MemoryConfig;
use parlor_core::{
    ConversationId, ConversationOrchestrator, CoreError, EndpointHandle, GenerationParams,
    PromptTemplate, StopSet,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "content": text } }]
    }))
}

async fn probed_endpoint(server: &MockServer) -> Arc<EndpointHandle> {
    let handle = Arc::new(EndpointHandle::new(&server.uri(), GenerationParams::default()));
    handle.probe().await.unwrap();
    handle
}

fn orchestrator(endpoint: Arc<EndpointHandle>, memory: MemoryConfig) -> ConversationOrchestrator {
    ConversationOrchestrator::new(
        "Ava",
        PromptTemplate::instruction("You are {{char}}, a ship's cat.", "Ava"),
        endpoint,
        StopSet::new(["</s>"]),
        &memory,
    )
}

#[tokio::test]
async fn reply_round_trip_through_chat_completions() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "stop": ["</s>", "\nUser:"] })))
        .respond_with(chat_reply(" Hello there\nUser:"))
        .expect(1)
        .mount(&server)
        .await;
    // probe
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply("4"))
        .mount(&server)
        .await;

    let bot = orchestrator(probed_endpoint(&server).await, MemoryConfig::default());
    let channel = ConversationId::from(42u64);

    let reply = bot.reply(&channel, "User", "hi Ava").await.unwrap();
    assert_eq!(reply, " Hello there");

    let history = bot.memory().peek(&channel).unwrap().lock().await.history();
    assert_eq!(history, "User: hi Ava\nAva:  Hello there");
}

#[tokio::test]
async fn unavailable_endpoint_rejects_messages_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let endpoint = Arc::new(EndpointHandle::new(&server.uri(), GenerationParams::default()));
    assert!(endpoint.probe().await.is_err());
    let probe_requests = server.received_requests().await.unwrap().len();

    let bot = orchestrator(endpoint, MemoryConfig::default());
    let channel = ConversationId::from("c");

    assert!(matches!(
        bot.reply(&channel, "User", "hi").await,
        Err(CoreError::BackendUnavailable { .. })
    ));
    assert!(matches!(
        bot.observe(&channel, "User", "hi").await,
        Err(CoreError::BackendUnavailable { .. })
    ));
    assert!(bot.memory().is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), probe_requests);
}

#[tokio::test]
async fn long_conversation_is_summarized_by_the_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_reply("The user and Ava chatted about the weather."))
        .mount(&server)
        .await;

    let bot = orchestrator(
        probed_endpoint(&server).await,
        MemoryConfig {
            token_budget: 30,
            max_conversations: 8,
        },
    );
    let channel = ConversationId::from("weather");

    for i in 0..6 {
        bot.reply(&channel, "User", &format!("what is the weather like on day {i}?"))
            .await
            .unwrap();
        let memory = bot.memory().peek(&channel).unwrap();
        let state = memory.lock().await;
        assert!(state.buffered_tokens() <= state.token_budget());
    }

    let memory = bot.memory().peek(&channel).unwrap();
    let state = memory.lock().await;
    assert_eq!(state.summary(), "The user and Ava chatted about the weather.");
    assert!(state.history().starts_with("System: The user and Ava"));
}
