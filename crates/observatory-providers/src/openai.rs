use async_trait::async_trait;
use chrono::DateTime;
use observatory_core::config::AppConfig;
use observatory_core::error::{ConfigError, ProviderError};
use observatory_core::generation::{GenerationRequest, ReportedUsage};
use observatory_core::model::{Credential, ProviderKind};
use observatory_core::provider::{VendorClient, VendorReply};
use reqwest::Client;
use std::time::Duration;

use crate::adapter::ConnectVendor;
use crate::http;

/// Chat Completions API client.
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            http: http::build_client(timeout)?,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn request_body(model: &str, request: &GenerationRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": [{"role": "user", "content": request.prompt()}],
            "temperature": request.temperature(),
            "max_tokens": request.max_tokens(),
        });
        http::merge_extra(&mut body, request.extra());
        body
    }
}

impl ConnectVendor for OpenAiClient {
    const PROVIDER: ProviderKind = ProviderKind::OpenAI;
    const CREDENTIAL_HINT: &'static str = "set OPENAI_API_KEY or pass an API key";

    fn connect(credential: Credential, config: &AppConfig) -> Result<Self, ConfigError> {
        Self::new(
            credential.secret(),
            config.base_urls.openai.clone(),
            Duration::from_secs(config.llm.defaults.timeout_secs),
        )
    }
}

#[async_trait]
impl VendorClient for OpenAiClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    async fn complete(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<VendorReply, ProviderError> {
        let resp = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(model, request))
            .send()
            .await
            .map_err(http::transport_error)?;

        let json = http::read_json(resp).await?;
        Ok(parse_openai_response(json))
    }
}

fn parse_openai_response(json: serde_json::Value) -> VendorReply {
    let choice = &json["choices"][0];
    let usage = &json["usage"];

    VendorReply {
        text: choice["message"]["content"].as_str().map(String::from),
        usage: ReportedUsage::Exact {
            prompt: usage["prompt_tokens"].as_u64().unwrap_or(0),
            completion: usage["completion_tokens"].as_u64().unwrap_or(0),
        },
        finish_reason: choice["finish_reason"].as_str().map(String::from),
        created: json["created"]
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        raw: json,
    }
}
