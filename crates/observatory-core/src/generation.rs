use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DefaultParameters;
use crate::cost::{round_to, CostBreakdown};
use crate::error::ConfigError;
use crate::model::ProviderKind;
use crate::session::SessionInfo;

/// One prompt sent to a provider. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    prompt: String,
    temperature: f32,
    max_tokens: u32,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32, max_tokens: u32) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigError::InvalidParameter {
                name: "temperature",
                reason: format!("{temperature} is outside 0.0..=1.0"),
            });
        }
        if max_tokens == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_tokens",
                reason: "must be positive".into(),
            });
        }
        Ok(Self {
            prompt: prompt.into(),
            temperature,
            max_tokens,
            extra: serde_json::Map::new(),
        })
    }

    pub fn with_defaults(prompt: impl Into<String>, defaults: &DefaultParameters) -> Result<Self, ConfigError> {
        Self::new(prompt, defaults.temperature, defaults.max_tokens)
    }

    /// Provider-specific option merged into the vendor request body.
    pub fn with_option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn extra(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extra
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Usage as a vendor reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedUsage {
    /// Exact token counts from the vendor.
    Exact { prompt: u64, completion: u64 },
    /// Character counts only; converted with [`CHARS_PER_TOKEN`].
    Characters { prompt: u64, completion: u64 },
}

/// Rough characters-per-token ratio for vendors that report no token counts.
/// This is an estimate with no error bound.
pub const CHARS_PER_TOKEN: u64 = 4;

impl ReportedUsage {
    pub fn tokens(&self) -> TokenUsage {
        match *self {
            Self::Exact { prompt, completion } => TokenUsage::new(prompt, completion),
            Self::Characters { prompt, completion } => {
                TokenUsage::new(prompt / CHARS_PER_TOKEN, completion / CHARS_PER_TOKEN)
            }
        }
    }

    pub fn is_estimate(&self) -> bool {
        matches!(self, Self::Characters { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub response_time: f64,
    pub tokens_per_second: f64,
    pub retry_count: u32,
}

impl Performance {
    /// A zero (mocked or instant) response time yields zero throughput.
    pub fn new(response_time_secs: f64, total_tokens: u64, retry_count: u32) -> Self {
        let tokens_per_second = if response_time_secs > 0.0 {
            round_to(total_tokens as f64 / response_time_secs, 2)
        } else {
            0.0
        };
        Self {
            response_time: round_to(response_time_secs, 3),
            tokens_per_second,
            retry_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionInfo {
    pub finish_reason: Option<String>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub provider: ProviderKind,
    pub model: String,
    pub tokens: TokenUsage,
    pub costs: CostBreakdown,
    pub performance: Performance,
    pub session_info: SessionInfo,
    pub completion_info: CompletionInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub response: String,
    pub metadata: GenerationMetadata,
}

impl GenerationResult {
    /// Minimal shape check. Returns the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        let meta = &self.metadata;
        if meta.model.is_empty() {
            return Err("metadata is missing the model name".into());
        }
        let tokens = &meta.tokens;
        if tokens.total_tokens != tokens.prompt_tokens + tokens.completion_tokens {
            return Err(format!(
                "total_tokens {} != prompt_tokens {} + completion_tokens {}",
                tokens.total_tokens, tokens.prompt_tokens, tokens.completion_tokens
            ));
        }
        let costs = &meta.costs;
        if costs.input_cost < 0.0 || costs.output_cost < 0.0 {
            return Err("negative cost".into());
        }
        if (costs.total_cost - (costs.input_cost + costs.output_cost)).abs() > 1e-6 {
            return Err(format!(
                "total_cost {} != input_cost {} + output_cost {}",
                costs.total_cost, costs.input_cost, costs.output_cost
            ));
        }
        let perf = &meta.performance;
        if !perf.response_time.is_finite() || perf.response_time < 0.0 {
            return Err(format!("invalid response_time {}", perf.response_time));
        }
        if !perf.tokens_per_second.is_finite() {
            return Err(format!("invalid tokens_per_second {}", perf.tokens_per_second));
        }
        Ok(())
    }

    pub fn total_tokens(&self) -> u64 {
        self.metadata.tokens.total_tokens
    }

    pub fn total_cost(&self) -> f64 {
        self.metadata.costs.total_cost
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    pub max_tokens: u32,
    pub supported_models: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostInfo {
    pub input_cost: f64,
    pub output_cost: f64,
}

/// Static description of an adapter, returned by `describe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub provider: ProviderKind,
    pub model: String,
    pub capabilities: Capabilities,
    pub cost_info: CostInfo,
    pub session_info: SessionInfo,
    pub default_parameters: DefaultParameters,
}
