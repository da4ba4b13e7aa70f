use observatory_core::config::AppConfig;
use observatory_core::error::{ExportError, LlmError};
use observatory_core::export;
use observatory_core::generation::{GenerationRequest, GenerationResult};
use observatory_core::history::{History, HistoryEntry};
use observatory_core::monitoring::Alert;
use observatory_core::provider::LlmAdapter;
use std::path::PathBuf;

/// One adapter plus the history of calls made through it.
pub struct App {
    pub config: AppConfig,
    pub adapter: Box<dyn LlmAdapter>,
    pub history: History,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl App {
    pub fn new(
        config: AppConfig,
        adapter: Box<dyn LlmAdapter>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Self {
        let history = History::new(config.history_capacity);
        Self {
            config,
            adapter,
            history,
            temperature,
            max_tokens,
        }
    }

    fn build_request(&self, prompt: &str) -> Result<GenerationRequest, LlmError> {
        let defaults = &self.config.llm.defaults;
        let request = GenerationRequest::new(
            prompt,
            self.temperature.unwrap_or(defaults.temperature),
            self.max_tokens.unwrap_or(defaults.max_tokens),
        )?;
        Ok(request)
    }

    /// Sends one prompt and records the outcome in the history.
    pub async fn ask(&mut self, prompt: &str) -> Result<GenerationResult, LlmError> {
        let request = self.build_request(prompt)?;
        match self.adapter.generate(&request).await {
            Ok(result) => {
                self.history.append(HistoryEntry::from_result(prompt, &result));
                Ok(result)
            }
            Err(e) => {
                self.history.record_failure();
                Err(e)
            }
        }
    }

    /// Alerts raised by the latest call and the session totals.
    pub fn alerts(&self, last_response_time: Option<f64>) -> Vec<Alert> {
        let alerts = self
            .config
            .monitoring
            .evaluate(&self.history.session_summary(), last_response_time);
        for alert in &alerts {
            tracing::warn!(
                session_id = %self.adapter.snapshot().session_id,
                alert = %alert,
                "monitoring threshold crossed"
            );
        }
        alerts
    }

    pub fn export(&self) -> Result<PathBuf, ExportError> {
        export::export_to_file(&self.config.data_path(), &self.history)
    }

    pub async fn shutdown(&mut self) {
        self.adapter.teardown().await;
    }
}
