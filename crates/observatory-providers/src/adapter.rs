use async_trait::async_trait;
use chrono::Utc;
use observatory_core::config::{AppConfig, DefaultParameters};
use observatory_core::cost::CostTable;
use observatory_core::error::{ConfigError, LlmError};
use observatory_core::generation::{
    Capabilities, CompletionInfo, CostInfo, GenerationMetadata, GenerationRequest,
    GenerationResult, ModelInfo, Performance,
};
use observatory_core::model::{Credential, Environment, ProviderKind};
use observatory_core::provider::{LlmAdapter, VendorClient, VendorReply};
use observatory_core::session::{SessionInfo, SessionTracker};

use crate::retry::RetryPolicy;

/// Caller-supplied settings for a new adapter. Anything left `None` falls
/// back to the config.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub credential: Option<Credential>,
    pub model: Option<String>,
    pub application_id: Option<String>,
    pub environment: Environment,
}

/// A vendor client that can be built from a credential and the app config.
pub trait ConnectVendor: VendorClient + Sized {
    const PROVIDER: ProviderKind;
    const CREDENTIAL_HINT: &'static str;

    fn connect(credential: Credential, config: &AppConfig) -> Result<Self, ConfigError>;
}

/// The shared generate pipeline over one vendor client.
///
/// Owns its session tracker; `generate` takes `&mut self` so metrics are
/// only touched on the sequential request path.
pub struct Adapter<C: VendorClient> {
    /// `None` once torn down.
    client: Option<C>,
    provider: ProviderKind,
    model: String,
    supported_models: Vec<String>,
    costs: CostTable,
    defaults: DefaultParameters,
    retry: RetryPolicy,
    session: SessionTracker,
}

impl<C: ConnectVendor> Adapter<C> {
    /// Resolves the credential and model, then builds the HTTP client.
    /// Performs no network I/O.
    pub fn initialize(config: &AppConfig, options: InitOptions) -> Result<Self, ConfigError> {
        let credential = options
            .credential
            .clone()
            .or_else(|| config.credential_for(C::PROVIDER))
            .ok_or_else(|| ConfigError::MissingCredentials {
                provider: C::PROVIDER,
                hint: C::CREDENTIAL_HINT.into(),
            })?;

        // Fail on a bad model before building anything.
        resolve_model(config, C::PROVIDER, options.model.as_deref())?;

        let client = C::connect(credential, config)?;
        Self::with_client(client, config, options)
    }
}

impl<C: VendorClient> Adapter<C> {
    /// Wraps an already-built client.
    pub fn with_client(client: C, config: &AppConfig, options: InitOptions) -> Result<Self, ConfigError> {
        let provider = client.provider();
        let model = resolve_model(config, provider, options.model.as_deref())?;
        let session = SessionTracker::new(options.application_id, options.environment);

        tracing::info!(
            %provider,
            %model,
            session_id = session.id(),
            application_id = session.application_id(),
            environment = session.environment().tag(),
            "adapter initialized"
        );

        Ok(Self {
            client: Some(client),
            provider,
            model,
            supported_models: config.supported_models(provider).to_vec(),
            costs: config.cost_table(),
            defaults: config.llm.defaults.clone(),
            retry: RetryPolicy::from_defaults(&config.llm.defaults),
            session,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    async fn run(&mut self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
        let client = self.client.as_ref().ok_or(LlmError::Closed)?;
        let provider = self.provider;
        let model = self.model.as_str();

        let start = tokio::time::Instant::now();
        let outcome = self
            .retry
            .run(provider, || client.complete(model, request))
            .await
            .map_err(|e| LlmError::Provider {
                provider,
                attempts: e.attempts,
                source: e.error,
            })?;
        let elapsed = start.elapsed().as_secs_f64();

        let VendorReply {
            text,
            usage,
            finish_reason,
            created,
            raw,
        } = outcome.value;

        let response = text.ok_or_else(|| LlmError::Validation {
            provider,
            reason: "response contained no text".into(),
        })?;

        let tokens = usage.tokens();
        if usage.is_estimate() {
            tracing::debug!(%provider, total_tokens = tokens.total_tokens, "token counts estimated from characters");
        }
        let costs = self.costs.cost(provider, model, &tokens);

        let mut result = GenerationResult {
            response,
            metadata: GenerationMetadata {
                provider,
                model: self.model.clone(),
                tokens,
                costs,
                performance: Performance::new(elapsed, tokens.total_tokens, outcome.retries),
                session_info: self.session.snapshot(),
                completion_info: CompletionInfo {
                    finish_reason,
                    created: created.unwrap_or_else(Utc::now),
                },
            },
        };
        // All of this metadata is assembled locally.
        result
            .validate()
            .map_err(|reason| LlmError::Unexpected(format!("inconsistent result metadata: {reason}")))?;

        self.session.record(tokens.total_tokens, costs.total_cost);
        result.metadata.session_info = self.session.snapshot();

        tracing::debug!(%provider, raw = %raw, "vendor response");
        self.log_interaction(request, &result);
        Ok(result)
    }

    fn log_interaction(&self, request: &GenerationRequest, result: &GenerationResult) {
        let metrics = self.session.metrics();
        match serde_json::to_string(result) {
            Ok(result_json) => tracing::info!(
                target: "llm_interaction",
                session_id = self.session.id(),
                application_id = self.session.application_id(),
                environment = self.session.environment().tag(),
                provider = %self.provider,
                model = %self.model,
                prompt = request.prompt(),
                result = %result_json,
                total_requests = metrics.total_requests,
                total_tokens = metrics.total_tokens,
                total_cost = metrics.total_cost,
                "llm interaction"
            ),
            Err(e) => tracing::warn!(
                session_id = self.session.id(),
                error = %e,
                "failed to serialize interaction for logging"
            ),
        }
    }
}

#[async_trait]
impl<C: VendorClient> LlmAdapter for Adapter<C> {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&mut self, request: &GenerationRequest) -> Result<GenerationResult, LlmError> {
        let result = self.run(request).await;
        if let Err(e) = &result {
            tracing::error!(
                session_id = self.session.id(),
                provider = %self.provider,
                model = %self.model,
                attempts = e.attempts(),
                error = %e,
                "generation failed"
            );
        }
        result
    }

    fn describe(&self) -> ModelInfo {
        let rate = self.costs.rate_or_zero(self.provider, &self.model);
        ModelInfo {
            provider: self.provider,
            model: self.model.clone(),
            capabilities: Capabilities {
                max_tokens: self.defaults.max_tokens,
                supported_models: self.supported_models.clone(),
            },
            cost_info: CostInfo {
                input_cost: rate.input,
                output_cost: rate.output,
            },
            session_info: self.session.snapshot(),
            default_parameters: self.defaults.clone(),
        }
    }

    fn snapshot(&self) -> SessionInfo {
        self.session.snapshot()
    }

    async fn teardown(&mut self) {
        if self.client.take().is_some() {
            let metrics = self.session.metrics();
            tracing::info!(
                session_id = self.session.id(),
                provider = %self.provider,
                total_requests = metrics.total_requests,
                total_tokens = metrics.total_tokens,
                total_cost = metrics.total_cost,
                "adapter torn down"
            );
        }
    }
}

fn resolve_model(
    config: &AppConfig,
    provider: ProviderKind,
    requested: Option<&str>,
) -> Result<String, ConfigError> {
    let model = requested
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| provider.default_model());

    let supported = config.supported_models(provider);
    if supported.iter().any(|m| m == model) {
        Ok(model.to_string())
    } else {
        Err(ConfigError::UnsupportedModel {
            provider,
            model: model.to_string(),
            supported: supported.to_vec(),
        })
    }
}
