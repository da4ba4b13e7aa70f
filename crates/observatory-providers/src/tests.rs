use super::*;
use async_trait::async_trait;
use observatory_core::error::{ConfigError, ProviderError};
use observatory_core::generation::{GenerationRequest, ReportedUsage};
use observatory_core::model::{Credential, Environment};
use observatory_core::provider::{VendorClient, VendorReply};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Replays a fixed sequence of vendor outcomes.
struct ScriptedClient {
    provider: ProviderKind,
    script: Mutex<VecDeque<Result<VendorReply, ProviderError>>>,
    calls: Arc<AtomicU32>,
}

impl ScriptedClient {
    fn new(
        provider: ProviderKind,
        script: Vec<Result<VendorReply, ProviderError>>,
    ) -> (Self, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let client = Self {
            provider,
            script: Mutex::new(script.into()),
            calls: calls.clone(),
        };
        (client, calls)
    }
}

#[async_trait]
impl VendorClient for ScriptedClient {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    async fn complete(
        &self,
        _model: &str,
        _request: &GenerationRequest,
    ) -> Result<VendorReply, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ProviderError::Http("script exhausted".into())))
    }
}

fn reply(text: Option<&str>, usage: ReportedUsage) -> Result<VendorReply, ProviderError> {
    Ok(VendorReply {
        text: text.map(String::from),
        usage,
        finish_reason: Some("stop".into()),
        created: None,
        raw: json!({}),
    })
}

fn exact(prompt: u64, completion: u64) -> ReportedUsage {
    ReportedUsage::Exact { prompt, completion }
}

fn request() -> GenerationRequest {
    GenerationRequest::new("What is Rust?", 0.5, 64).unwrap()
}

fn scripted_adapter(
    provider: ProviderKind,
    script: Vec<Result<VendorReply, ProviderError>>,
) -> (Adapter<ScriptedClient>, Arc<AtomicU32>) {
    let (client, calls) = ScriptedClient::new(provider, script);
    let adapter = Adapter::with_client(client, &AppConfig::default(), InitOptions::default()).unwrap();
    (adapter, calls)
}

// --- pipeline ---

#[tokio::test(start_paused = true)]
async fn test_generate_computes_exact_cost() {
    let (mut adapter, calls) = scripted_adapter(
        ProviderKind::OpenAI,
        vec![reply(Some("A systems language."), exact(100, 50))],
    );

    let result = adapter.generate(&request()).await.unwrap();
    let meta = &result.metadata;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.response, "A systems language.");
    assert_eq!(meta.model, "gpt-3.5-turbo");
    assert_eq!(meta.tokens.total_tokens, 150);
    assert!((meta.costs.input_cost - 0.00005).abs() < 1e-9);
    assert!((meta.costs.output_cost - 0.000075).abs() < 1e-9);
    assert!((meta.costs.total_cost - 0.000125).abs() < 1e-9);
    assert_eq!(meta.performance.retry_count, 0);
    assert_eq!(meta.completion_info.finish_reason.as_deref(), Some("stop"));

    // Paused clock: no time passes, so throughput falls back to zero.
    assert_eq!(meta.performance.response_time, 0.0);
    assert_eq!(meta.performance.tokens_per_second, 0.0);

    assert_eq!(meta.session_info.metrics.total_requests, 1);
    assert_eq!(meta.session_info.metrics.total_tokens, 150);
}

#[tokio::test(start_paused = true)]
async fn test_retries_then_succeeds_with_backoff() {
    let (mut adapter, calls) = scripted_adapter(
        ProviderKind::OpenAI,
        vec![
            Err(ProviderError::Timeout),
            Err(ProviderError::Api {
                status: 503,
                message: "overloaded".into(),
            }),
            reply(Some("ok"), exact(10, 10)),
        ],
    );

    let result = adapter.generate(&request()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.metadata.performance.retry_count, 2);
    // 1s after the first failure, 2s after the second.
    assert!(result.metadata.performance.response_time >= 3.0);
    assert!(result.metadata.performance.tokens_per_second > 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_exhausted() {
    let script = (0..5).map(|_| Err(ProviderError::Http("connection reset".into()))).collect();
    let (mut adapter, calls) = scripted_adapter(ProviderKind::Anthropic, script);

    let err = adapter.generate(&request()).await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(err.attempts(), Some(3));
    assert!(matches!(
        err,
        LlmError::Provider {
            provider: ProviderKind::Anthropic,
            source: ProviderError::Http(_),
            ..
        }
    ));
    assert_eq!(adapter.snapshot().metrics.total_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_error_not_retried() {
    let (mut adapter, calls) = scripted_adapter(
        ProviderKind::OpenAI,
        vec![Err(ProviderError::Api {
            status: 401,
            message: "invalid api key".into(),
        })],
    );

    let start = tokio::time::Instant::now();
    let err = adapter.generate(&request()).await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.attempts(), Some(1));
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_parse_error_not_retried() {
    let (mut adapter, calls) = scripted_adapter(
        ProviderKind::OpenAI,
        vec![Err(ProviderError::Parse("expected value".into()))],
    );
    let err = adapter.generate(&request()).await.unwrap_err();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!err.is_configuration());
}

#[tokio::test(start_paused = true)]
async fn test_missing_text_is_validation_error() {
    let (mut adapter, calls) = scripted_adapter(
        ProviderKind::Anthropic,
        vec![reply(None, exact(12, 0)), reply(Some("late"), exact(1, 1))],
    );

    let err = adapter.generate(&request()).await.unwrap_err();
    assert!(matches!(err, LlmError::Validation { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.snapshot().metrics.total_requests, 0);
    assert_eq!(adapter.snapshot().metrics.total_tokens, 0);
}

#[tokio::test(start_paused = true)]
async fn test_inconsistent_metadata_is_unexpected_error() {
    let mut config = AppConfig::default();
    config.model_costs.insert(
        ProviderKind::OpenAI,
        "gpt-3.5-turbo",
        observatory_core::cost::CostRate::new(-0.001, 0.002),
    );
    let (client, calls) = ScriptedClient::new(
        ProviderKind::OpenAI,
        vec![reply(Some("fine"), exact(100, 50))],
    );
    let mut adapter = Adapter::with_client(client, &config, InitOptions::default()).unwrap();

    let err = adapter.generate(&request()).await.unwrap_err();
    match &err {
        LlmError::Unexpected(reason) => assert!(reason.contains("negative cost")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.attempts(), None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.snapshot().metrics.total_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn test_character_usage_is_estimated() {
    let (mut adapter, _) = scripted_adapter(
        ProviderKind::Gemini,
        vec![reply(
            Some("estimated"),
            ReportedUsage::Characters {
                prompt: 41,
                completion: 400,
            },
        )],
    );

    let result = adapter.generate(&request()).await.unwrap();
    assert_eq!(result.metadata.model, "gemini-1.0-pro");
    assert_eq!(result.metadata.tokens.prompt_tokens, 10);
    assert_eq!(result.metadata.tokens.completion_tokens, 100);
    assert_eq!(result.metadata.costs.total_cost, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_session_metrics_accumulate() {
    let (mut adapter, _) = scripted_adapter(
        ProviderKind::OpenAI,
        vec![
            reply(Some("one"), exact(100, 50)),
            Err(ProviderError::Api {
                status: 400,
                message: "bad".into(),
            }),
            reply(Some("two"), exact(200, 100)),
        ],
    );

    let first = adapter.generate(&request()).await.unwrap();
    assert!(adapter.generate(&request()).await.is_err());
    let second = adapter.generate(&request()).await.unwrap();

    let a = first.metadata.session_info.metrics;
    let b = second.metadata.session_info.metrics;
    assert_eq!(a.total_requests, 1);
    assert_eq!(b.total_requests, 2);
    assert_eq!(b.total_tokens, 450);
    assert!(b.total_cost >= a.total_cost);
    assert_eq!(adapter.snapshot().metrics, b);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_closes_adapter() {
    let (mut adapter, calls) = scripted_adapter(
        ProviderKind::OpenAI,
        vec![reply(Some("never"), exact(1, 1))],
    );

    adapter.teardown().await;
    assert!(adapter.is_closed());
    adapter.teardown().await;

    let err = adapter.generate(&request()).await.unwrap_err();
    assert!(matches!(err, LlmError::Closed));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_describe_reports_costs_and_defaults() {
    let (adapter, _) = scripted_adapter(ProviderKind::Anthropic, vec![]);
    let info = adapter.describe();

    assert_eq!(info.provider, ProviderKind::Anthropic);
    assert_eq!(info.model, "claude-3-haiku-20240307");
    assert_eq!(info.cost_info.input_cost, 0.00025);
    assert_eq!(info.cost_info.output_cost, 0.00125);
    assert_eq!(info.capabilities.max_tokens, 500);
    assert!(info
        .capabilities
        .supported_models
        .contains(&"claude-3-opus-latest".to_string()));
    assert_eq!(info.session_info.application_id, "default-app");
    assert_eq!(info.default_parameters.retry_attempts, 3);
}

#[test]
fn test_sessions_are_per_adapter() {
    let (a, _) = scripted_adapter(ProviderKind::OpenAI, vec![]);
    let (b, _) = scripted_adapter(ProviderKind::OpenAI, vec![]);
    assert_ne!(a.snapshot().session_id, b.snapshot().session_id);
}

#[test]
fn test_backoff_schedule() {
    let policy = RetryPolicy::new(3, Duration::from_millis(1000));
    assert_eq!(policy.backoff(0), Duration::from_secs(1));
    assert_eq!(policy.backoff(1), Duration::from_secs(2));
    assert_eq!(policy.backoff(2), Duration::from_secs(4));
    assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
}

// --- construction ---

#[test]
fn test_missing_credentials() {
    let config = AppConfig::default();
    for provider in ProviderKind::ALL {
        let err = create_adapter(&config, provider, InitOptions::default()).err().unwrap();
        assert!(err.is_configuration());
        assert!(matches!(
            err,
            LlmError::Configuration(ConfigError::MissingCredentials { provider: p, .. }) if p == provider
        ));
    }
}

#[test]
fn test_unsupported_model() {
    let options = InitOptions {
        credential: Credential::api_key("sk-test"),
        model: Some("gpt-2".into()),
        ..Default::default()
    };
    let err = create_adapter(&AppConfig::default(), ProviderKind::OpenAI, options)
        .err()
        .unwrap();
    match err {
        LlmError::Configuration(ConfigError::UnsupportedModel { model, supported, .. }) => {
            assert_eq!(model, "gpt-2");
            assert!(supported.contains(&"gpt-4".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_ambient_credentials_and_options() {
    let config = AppConfig {
        anthropic_api_key: Some("sk-ant".into()),
        ..Default::default()
    };
    let options = InitOptions {
        model: Some("claude-3-opus-latest".into()),
        application_id: Some("billing-bot".into()),
        environment: Environment::Production,
        ..Default::default()
    };
    let adapter = create_adapter(&config, ProviderKind::Anthropic, options).unwrap();
    assert_eq!(adapter.model(), "claude-3-opus-latest");

    let session = adapter.snapshot();
    assert_eq!(session.application_id, "billing-bot");
    assert_eq!(session.environment, "prod");
    assert_eq!(session.metrics.total_requests, 0);
}

#[test]
fn test_vertex_requires_project() {
    let config = AppConfig {
        google_access_token: Some("ya29.token".into()),
        ..Default::default()
    };
    let err = create_adapter(&config, ProviderKind::Gemini, InitOptions::default())
        .err()
        .unwrap();
    assert!(matches!(
        err,
        LlmError::Configuration(ConfigError::MissingField(_))
    ));
}

// --- vendor HTTP mapping ---

fn mock_config(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.base_urls.openai = server.uri();
    config.base_urls.anthropic = server.uri();
    config.base_urls.gemini = server.uri();
    config.base_urls.vertex = Some(server.uri());
    config.llm.defaults.retry_base_delay_ms = 1;
    config.llm.defaults.timeout_secs = 5;
    config
}

fn with_key(key: &str) -> InitOptions {
    InitOptions {
        credential: Credential::api_key(key),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_openai_request_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "What is Rust?"}],
            "temperature": 0.5,
            "max_tokens": 64,
            "top_p": 0.9
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "created": 1700000000,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "A language."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = InitOptions {
        model: Some("gpt-4".into()),
        ..with_key("sk-test")
    };
    let mut adapter = create_adapter(&mock_config(&server), ProviderKind::OpenAI, options).unwrap();
    let result = adapter
        .generate(&request().with_option("top_p", json!(0.9)))
        .await
        .unwrap();

    assert_eq!(result.response, "A language.");
    assert_eq!(result.metadata.tokens.prompt_tokens, 12);
    assert_eq!(result.metadata.tokens.completion_tokens, 3);
    assert_eq!(result.metadata.completion_info.created.timestamp(), 1700000000);
    assert!((result.metadata.costs.total_cost - 0.00054).abs() < 1e-9);
}

#[tokio::test]
async fn test_anthropic_request_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-3-haiku-20240307",
            "max_tokens": 64,
            "messages": [{"role": "user", "content": "What is Rust?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "content": [
                {"type": "text", "text": "Fast "},
                {"type": "tool_use", "id": "t1", "name": "noop", "input": {}},
                {"type": "text", "text": "and safe."}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 20, "output_tokens": 8}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut adapter =
        create_adapter(&mock_config(&server), ProviderKind::Anthropic, with_key("sk-ant")).unwrap();
    let result = adapter.generate(&request()).await.unwrap();

    assert_eq!(result.response, "Fast and safe.");
    assert_eq!(result.metadata.tokens.total_tokens, 28);
    assert_eq!(
        result.metadata.completion_info.finish_reason.as_deref(),
        Some("end_turn")
    );
}

#[tokio::test]
async fn test_gemini_api_key_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-1.0-pro:generateContent"))
        .and(query_param("key", "g-key"))
        .and(body_partial_json(json!({
            "contents": [{"role": "user", "parts": [{"text": "What is Rust?"}]}],
            "generationConfig": {"temperature": 0.5, "maxOutputTokens": 64}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "A systems "}, {"text": "programming language."}]},
                "finishReason": "STOP"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut adapter =
        create_adapter(&mock_config(&server), ProviderKind::Gemini, with_key("g-key")).unwrap();
    let result = adapter.generate(&request()).await.unwrap();

    assert_eq!(result.response, "A systems programming language.");
    // 13 and 31 characters.
    assert_eq!(result.metadata.tokens.prompt_tokens, 3);
    assert_eq!(result.metadata.tokens.completion_tokens, 7);
    assert_eq!(result.metadata.costs.total_cost, 0.0);
    assert_eq!(
        result.metadata.completion_info.finish_reason.as_deref(),
        Some("STOP")
    );
}

#[tokio::test]
async fn test_gemini_vertex_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(
            "/v1/projects/demo/locations/us-central1/publishers/google/models/gemini-1.5-pro:generateContent",
        ))
        .and(header("authorization", "Bearer ya29.token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "hi"}]}, "finishReason": "STOP"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = mock_config(&server);
    config.google_cloud_project = Some("demo".into());
    let options = InitOptions {
        credential: Credential::access_token("ya29.token"),
        model: Some("gemini-1.5-pro".into()),
        ..Default::default()
    };
    let mut adapter = create_adapter(&config, ProviderKind::Gemini, options).unwrap();
    assert_eq!(adapter.generate(&request()).await.unwrap().response, "hi");
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let mut adapter =
        create_adapter(&mock_config(&server), ProviderKind::OpenAI, with_key("sk-test")).unwrap();
    let err = adapter.generate(&request()).await.unwrap_err();

    assert_eq!(err.attempts(), Some(3));
    match err {
        LlmError::Provider {
            source: ProviderError::Api { status, message },
            ..
        } => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream unavailable");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .expect(3)
        .mount(&server)
        .await;

    let mut adapter =
        create_adapter(&mock_config(&server), ProviderKind::Anthropic, with_key("sk-ant")).unwrap();
    let err = adapter.generate(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        LlmError::Provider {
            source: ProviderError::RateLimited { retry_after_ms: 7000 },
            attempts: 3,
            ..
        }
    ));
}

#[tokio::test]
async fn test_oversized_retry_after_saturates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("retry-after", "18446744073709552"),
        )
        .expect(3)
        .mount(&server)
        .await;

    let mut adapter =
        create_adapter(&mock_config(&server), ProviderKind::Anthropic, with_key("sk-ant")).unwrap();
    let err = adapter.generate(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        LlmError::Provider {
            source: ProviderError::RateLimited { retry_after_ms: u64::MAX },
            attempts: 3,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unauthorized_fails_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut adapter =
        create_adapter(&mock_config(&server), ProviderKind::OpenAI, with_key("sk-bad")).unwrap();
    let err = adapter.generate(&request()).await.unwrap_err();

    assert_eq!(err.attempts(), Some(1));
    assert!(err.to_string().contains("Incorrect API key provided"));
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut adapter =
        create_adapter(&mock_config(&server), ProviderKind::OpenAI, with_key("sk-test")).unwrap();
    let err = adapter.generate(&request()).await.unwrap_err();
    assert!(matches!(
        err,
        LlmError::Provider {
            source: ProviderError::Parse(_),
            attempts: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn test_empty_choices_is_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [],
            "usage": {"prompt_tokens": 5, "completion_tokens": 0}
        })))
        .mount(&server)
        .await;

    let mut adapter =
        create_adapter(&mock_config(&server), ProviderKind::OpenAI, with_key("sk-test")).unwrap();
    let err = adapter.generate(&request()).await.unwrap_err();
    assert!(matches!(err, LlmError::Validation { .. }));
    assert_eq!(adapter.snapshot().metrics.total_requests, 0);
}
