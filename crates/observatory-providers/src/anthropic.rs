use async_trait::async_trait;
use observatory_core::config::AppConfig;
use observatory_core::error::{ConfigError, ProviderError};
use observatory_core::generation::{GenerationRequest, ReportedUsage};
use observatory_core::model::{Credential, ProviderKind};
use observatory_core::provider::{VendorClient, VendorReply};
use reqwest::Client;
use std::time::Duration;

use crate::adapter::ConnectVendor;
use crate::http;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API client.
pub struct AnthropicClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl AnthropicClient {
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
            "max_tokens": request.max_tokens(),
            "temperature": request.temperature(),
            "messages": [{"role": "user", "content": request.prompt()}],
        });
        http::merge_extra(&mut body, request.extra());
        body
    }
}

impl ConnectVendor for AnthropicClient {
    const PROVIDER: ProviderKind = ProviderKind::Anthropic;
    const CREDENTIAL_HINT: &'static str = "set ANTHROPIC_API_KEY or pass an API key";

    fn connect(credential: Credential, config: &AppConfig) -> Result<Self, ConfigError> {
        Self::new(
            credential.secret(),
            config.base_urls.anthropic.clone(),
            Duration::from_secs(config.llm.defaults.timeout_secs),
        )
    }
}

#[async_trait]
impl VendorClient for AnthropicClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn complete(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<VendorReply, ProviderError> {
        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&Self::request_body(model, request))
            .send()
            .await
            .map_err(http::transport_error)?;

        let json = http::read_json(resp).await?;
        Ok(parse_anthropic_response(json))
    }
}

fn parse_anthropic_response(json: serde_json::Value) -> VendorReply {
    let text_blocks: Vec<&str> = json["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect()
        })
        .unwrap_or_default();

    let text = (!text_blocks.is_empty()).then(|| text_blocks.concat());
    let usage = &json["usage"];

    VendorReply {
        text,
        usage: ReportedUsage::Exact {
            prompt: usage["input_tokens"].as_u64().unwrap_or(0),
            completion: usage["output_tokens"].as_u64().unwrap_or(0),
        },
        finish_reason: json["stop_reason"].as_str().map(String::from),
        created: None,
        raw: json,
    }
}
