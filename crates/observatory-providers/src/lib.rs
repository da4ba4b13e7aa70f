mod adapter;
mod anthropic;
mod gemini;
mod http;
mod openai;
pub mod retry;

pub use adapter::{Adapter, ConnectVendor, InitOptions};
pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use retry::RetryPolicy;

use observatory_core::config::AppConfig;
use observatory_core::error::LlmError;
use observatory_core::model::ProviderKind;
use observatory_core::provider::LlmAdapter;

pub type OpenAiAdapter = Adapter<OpenAiClient>;
pub type AnthropicAdapter = Adapter<AnthropicClient>;
pub type GeminiAdapter = Adapter<GeminiClient>;

/// Build the adapter for `provider`. Fails on missing credentials or an
/// unsupported model without touching the network.
pub fn create_adapter(
    config: &AppConfig,
    provider: ProviderKind,
    options: InitOptions,
) -> Result<Box<dyn LlmAdapter>, LlmError> {
    let adapter: Box<dyn LlmAdapter> = match provider {
        ProviderKind::OpenAI => Box::new(OpenAiAdapter::initialize(config, options)?),
        ProviderKind::Anthropic => Box::new(AnthropicAdapter::initialize(config, options)?),
        ProviderKind::Gemini => Box::new(GeminiAdapter::initialize(config, options)?),
    };
    Ok(adapter)
}

#[cfg(test)]
mod tests;
