use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{LlmError, ProviderError};
use crate::generation::{GenerationRequest, GenerationResult, ModelInfo, ReportedUsage};
use crate::model::ProviderKind;
use crate::session::SessionInfo;

/// What a vendor returned for one successful HTTP exchange.
#[derive(Debug, Clone)]
pub struct VendorReply {
    /// `None` when the body carried no generated text.
    pub text: Option<String>,
    pub usage: ReportedUsage,
    pub finish_reason: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub raw: serde_json::Value,
}

/// Maps a [`GenerationRequest`] onto one vendor's wire format.
#[async_trait]
pub trait VendorClient: Send + Sync {
    fn provider(&self) -> ProviderKind;

    async fn complete(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> Result<VendorReply, ProviderError>;
}

/// The contract every provider adapter exposes to callers.
#[async_trait]
pub trait LlmAdapter: Send {
    fn provider(&self) -> ProviderKind;

    fn model(&self) -> &str;

    async fn generate(&mut self, request: &GenerationRequest) -> Result<GenerationResult, LlmError>;

    fn describe(&self) -> ModelInfo;

    fn snapshot(&self) -> SessionInfo;

    /// Releases the vendor client. Safe to call more than once.
    async fn teardown(&mut self);
}
