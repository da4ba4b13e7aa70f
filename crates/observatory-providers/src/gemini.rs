use async_trait::async_trait;
use observatory_core::config::AppConfig;
use observatory_core::error::{ConfigError, ProviderError};
use observatory_core::generation::{GenerationRequest, ReportedUsage};
use observatory_core::model::{Credential, ProviderKind};
use observatory_core::provider::{VendorClient, VendorReply};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

use crate::adapter::ConnectVendor;
use crate::http;

/// How requests reach the model.
enum Endpoint {
    /// Generative Language API, key in the query string.
    Studio { base_url: String, api_key: String },
    /// Vertex AI with an ambient OAuth bearer token.
    Vertex {
        base_url: String,
        access_token: String,
        project: String,
        location: String,
    },
}

/// `generateContent` client. Gemini replies are metered by characters here.
pub struct GeminiClient {
    http: Client,
    endpoint: Endpoint,
}

impl GeminiClient {
    pub fn with_api_key(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            http: http::build_client(timeout)?,
            endpoint: Endpoint::Studio {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                api_key: api_key.into(),
            },
        })
    }

    pub fn with_access_token(
        access_token: impl Into<String>,
        project: impl Into<String>,
        location: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            http: http::build_client(timeout)?,
            endpoint: Endpoint::Vertex {
                base_url: base_url.into().trim_end_matches('/').to_string(),
                access_token: access_token.into(),
                project: project.into(),
                location: location.into(),
            },
        })
    }

    fn post(&self, model: &str) -> RequestBuilder {
        match &self.endpoint {
            Endpoint::Studio { base_url, api_key } => self
                .http
                .post(format!("{base_url}/v1beta/models/{model}:generateContent"))
                .query(&[("key", api_key)]),
            Endpoint::Vertex {
                base_url,
                access_token,
                project,
                location,
            } => self
                .http
                .post(format!(
                    "{base_url}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
                ))
                .bearer_auth(access_token),
        }
    }

    fn request_body(request: &GenerationRequest) -> serde_json::Value {
        let mut generation_config = serde_json::json!({
            "temperature": request.temperature(),
            "maxOutputTokens": request.max_tokens(),
        });
        http::merge_extra(&mut generation_config, request.extra());

        serde_json::json!({
            "contents": [{"role": "user", "parts": [{"text": request.prompt()}]}],
            "generationConfig": generation_config,
        })
    }
}

impl ConnectVendor for GeminiClient {
    const PROVIDER: ProviderKind = ProviderKind::Gemini;
    const CREDENTIAL_HINT: &'static str =
        "set GEMINI_API_KEY, or GOOGLE_OAUTH_ACCESS_TOKEN with GOOGLE_CLOUD_PROJECT";

    fn connect(credential: Credential, config: &AppConfig) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.llm.defaults.timeout_secs);
        match credential {
            Credential::ApiKey(key) => {
                Self::with_api_key(key, config.base_urls.gemini.clone(), timeout)
            }
            Credential::AccessToken(token) => {
                let project = config
                    .google_cloud_project
                    .clone()
                    .filter(|p| !p.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingField("google_cloud_project".into()))?;
                Self::with_access_token(
                    token,
                    project,
                    config.google_cloud_location.clone(),
                    config.vertex_base_url(),
                    timeout,
                )
            }
        }
    }
}

#[async_trait]
impl VendorClient for GeminiClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn complete(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<VendorReply, ProviderError> {
        let resp = self
            .post(model)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(http::transport_error)?;

        let json = http::read_json(resp).await?;
        Ok(parse_gemini_response(json, request.prompt()))
    }
}

fn parse_gemini_response(json: serde_json::Value, prompt: &str) -> VendorReply {
    let candidate = &json["candidates"][0];
    let parts: Vec<&str> = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    let text = (!parts.is_empty()).then(|| parts.concat());
    let completion_chars = text.as_deref().map_or(0, |t| t.chars().count()) as u64;

    VendorReply {
        usage: ReportedUsage::Characters {
            prompt: prompt.chars().count() as u64,
            completion: completion_chars,
        },
        text,
        finish_reason: candidate["finishReason"].as_str().map(String::from),
        created: None,
        raw: json,
    }
}
