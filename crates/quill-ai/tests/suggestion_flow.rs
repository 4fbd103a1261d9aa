use std::time::Duration;

use httpmock::prelude::*;
use quill_ai::{
    AiConfig, AiError, EmbeddingsBackend, MatchOptions, ProviderKind, SuggestionService,
};
use quill_core::CompletionRequest;
use tokio_util::sync::CancellationToken;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn openai_config(base_url: &str) -> AiConfig {
    let mut config = AiConfig::default();
    config.provider.kind = ProviderKind::OpenAiCompatible;
    config.provider.url = base_url.parse().expect("mock server url");
    config.provider.model = "test-model".to_string();
    config.provider.timeout = Duration::from_secs(5);
    config.embeddings.backend = EmbeddingsBackend::Provider;
    config.embeddings.model = "test-embed".to_string();
    config
}

#[tokio::test]
async fn insertion_suggestion_end_to_end() {
    init_tracing();
    let server = MockServer::start_async().await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({
                "choices": [
                    { "message": { "content": "OK:[ the treasure, me hearties?]" } }
                ]
            }));
        })
        .await;

    let service = SuggestionService::from_config(&openai_config(&server.base_url())).unwrap();
    let request = CompletionRequest::new("Pirate", "Have you found", "");
    let suggestion = service
        .insertion_suggestion(&request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(suggestion, " the treasure, me hearties?");
    chat_mock.assert_async().await;
}

#[tokio::test]
async fn multi_sentence_replies_are_truncated_before_reaching_the_field() {
    init_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({
                "choices": [
                    { "message": { "content": "OK:[great! Our premium plan also includes NEED_INFO]" } }
                ]
            }));
        })
        .await;

    let service = SuggestionService::from_config(&openai_config(&server.base_url())).unwrap();
    let request = CompletionRequest::new("Sales agent", "The weather is ", "");
    let suggestion = service
        .insertion_suggestion(&request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(suggestion, "great!");
}

#[tokio::test]
async fn refusals_surface_as_empty_suggestions_not_errors() {
    init_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(serde_json::json!({
                "choices": [ { "message": { "content": "NO_PREDICTION" } } ]
            }));
        })
        .await;

    let service = SuggestionService::from_config(&openai_config(&server.base_url())).unwrap();
    let request = CompletionRequest::new("Support agent", "Goodbye for now.", "");
    let suggestion = service
        .insertion_suggestion(&request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(suggestion, "");
}

#[tokio::test]
async fn a_response_without_content_is_an_infrastructure_error() {
    init_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .json_body(serde_json::json!({ "choices": [] }));
        })
        .await;

    let service = SuggestionService::from_config(&openai_config(&server.base_url())).unwrap();
    let request = CompletionRequest::new("Casual", "Hello", "");
    let err = service
        .insertion_suggestion(&request, CancellationToken::new())
        .await
        .expect_err("missing content must not degrade silently");

    assert!(matches!(err, AiError::UnexpectedResponse(_)));
}

#[tokio::test]
async fn cancellation_aborts_an_in_flight_chat_call() {
    init_tracing();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .delay(Duration::from_secs(5))
                .json_body(serde_json::json!({
                    "choices": [ { "message": { "content": "OK:[too late]" } } ]
                }));
        })
        .await;

    let service = SuggestionService::from_config(&openai_config(&server.base_url())).unwrap();
    let request = CompletionRequest::new("Casual", "Hello", "");
    let cancel = CancellationToken::new();

    let (result, ()) = tokio::join!(
        service.insertion_suggestion(&request, cancel.clone()),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        }
    );

    assert!(matches!(result, Err(AiError::Cancelled)));
}

#[tokio::test]
async fn closest_match_end_to_end_ranks_by_semantic_proximity() {
    init_tracing();
    let server = MockServer::start_async().await;
    let index_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .body_contains("Groceries");
            then.status(200).json_body(serde_json::json!({
                "data": [
                    { "embedding": [1.0, 0.0, 0.0], "index": 0 },
                    { "embedding": [0.0, 1.0, 0.0], "index": 1 },
                    { "embedding": [0.0, 0.0, 1.0], "index": 2 },
                ]
            }));
        })
        .await;
    let query_mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/embeddings").body_contains("fuel");
            then.status(200).json_body(serde_json::json!({
                "data": [ { "embedding": [0.1, 0.0, 0.9], "index": 0 } ]
            }));
        })
        .await;

    let service = SuggestionService::from_config(&openai_config(&server.base_url())).unwrap();
    let index = service
        .build_index(
            vec!["Groceries".into(), "Rent".into(), "Gas".into()],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let best = service
        .best_match(&index, "fuel", CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(best.label, "Gas");
    assert!(best.score > 0.9, "score was {}", best.score);

    let ranked = service
        .closest_matches(
            &index,
            "fuel",
            &MatchOptions {
                max_results: 2,
                min_score: None,
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].label, "Gas");

    // The second query for "fuel" is served from the vector cache.
    index_mock.assert_async().await;
    query_mock.assert_async().await;
}

#[tokio::test]
async fn ollama_chat_backend_speaks_its_native_wire_format() {
    init_tracing();
    let server = MockServer::start_async().await;
    let chat_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/chat")
                .body_contains("END_INSERTION");
            then.status(200).json_body(serde_json::json!({
                "message": { "role": "assistant", "content": "OK:[n as NEED_INFO]" },
                "done": true
            }));
        })
        .await;

    let mut config = openai_config(&server.base_url());
    config.provider.kind = ProviderKind::Ollama;
    config.embeddings.backend = EmbeddingsBackend::Hash;

    let service = SuggestionService::from_config(&config).unwrap();
    let request = CompletionRequest::new("Storyteller", "Sir Digby Chicken Caesar, also know", "");
    let suggestion = service
        .insertion_suggestion(&request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(suggestion, "n as NEED_INFO");
    chat_mock.assert_async().await;
}
