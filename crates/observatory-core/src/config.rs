use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cost::CostTable;
use crate::error::ConfigError;
use crate::model::{Credential, ProviderKind};
use crate::monitoring::MonitoringConfig;

pub const PROJECT_NAME: &str = "LLM Observatory";

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default)]
    pub anthropic_api_key: Option<String>,

    /// Google AI Studio key (Generative Language API)
    #[serde(default)]
    pub gemini_api_key: Option<String>,

    /// Ambient OAuth bearer token for Vertex AI
    #[serde(default)]
    pub google_access_token: Option<String>,

    #[serde(default)]
    pub google_cloud_project: Option<String>,

    #[serde(default = "default_google_cloud_location")]
    pub google_cloud_location: String,

    #[serde(default)]
    pub base_urls: BaseUrls,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub monitoring: MonitoringConfig,

    #[serde(default)]
    pub logging: LogConfig,

    /// Overrides and additions to the built-in price table
    #[serde(default = "CostTable::empty")]
    pub model_costs: CostTable,

    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    #[serde(default)]
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            data_dir: default_data_dir(),
            log_dir: default_log_dir(),
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_api_key: None,
            google_access_token: None,
            google_cloud_project: None,
            google_cloud_location: default_google_cloud_location(),
            base_urls: BaseUrls::default(),
            llm: LlmSettings::default(),
            monitoring: MonitoringConfig::default(),
            logging: LogConfig::default(),
            model_costs: CostTable::empty(),
            history_capacity: default_history_capacity(),
            debug: false,
        }
    }
}

fn default_working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_data_dir() -> String {
    "data".into()
}

fn default_log_dir() -> String {
    "logs".into()
}

fn default_google_cloud_location() -> String {
    "us-central1".into()
}

fn default_history_capacity() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseUrls {
    #[serde(default = "default_openai_url")]
    pub openai: String,
    #[serde(default = "default_anthropic_url")]
    pub anthropic: String,
    #[serde(default = "default_gemini_url")]
    pub gemini: String,
    /// Defaults to `https://{location}-aiplatform.googleapis.com`
    #[serde(default)]
    pub vertex: Option<String>,
}

fn default_openai_url() -> String {
    OPENAI_BASE_URL.into()
}

fn default_anthropic_url() -> String {
    ANTHROPIC_BASE_URL.into()
}

fn default_gemini_url() -> String {
    GEMINI_BASE_URL.into()
}

impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            openai: default_openai_url(),
            anthropic: default_anthropic_url(),
            gemini: default_gemini_url(),
            vertex: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_openai_models")]
    pub openai_models: Vec<String>,
    #[serde(default = "default_anthropic_models")]
    pub anthropic_models: Vec<String>,
    #[serde(default = "default_gemini_models")]
    pub gemini_models: Vec<String>,
    #[serde(default)]
    pub defaults: DefaultParameters,
}

fn default_openai_models() -> Vec<String> {
    ProviderKind::OpenAI.builtin_models()
}

fn default_anthropic_models() -> Vec<String> {
    ProviderKind::Anthropic.builtin_models()
}

fn default_gemini_models() -> Vec<String> {
    ProviderKind::Gemini.builtin_models()
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            openai_models: default_openai_models(),
            anthropic_models: default_anthropic_models(),
            gemini_models: default_gemini_models(),
            defaults: DefaultParameters::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultParameters {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts per request, including the first
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Backoff unit: attempt `n` waits `base * 2^n`
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

impl Default for DefaultParameters {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_filename")]
    pub filename: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_filename() -> String {
    "llm_observatory.log".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            filename: default_log_filename(),
        }
    }
}

pub fn load_config(working_dir: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let wd = working_dir.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let mut config = AppConfig::default();
    config.working_dir = wd.clone();

    // Try loading global config
    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("llm-observatory").join("config.json");
        if global_path.exists() {
            merge_config(&mut config, read_config_file(&global_path)?);
        }
    }

    // Try loading local project config
    let local_path = wd.join("llm-observatory.json");
    if local_path.exists() {
        merge_config(&mut config, read_config_file(&local_path)?);
    }

    apply_env(&mut config, |name| std::env::var(name).ok());

    tracing::info!(
        project = PROJECT_NAME,
        version = env!("CARGO_PKG_VERSION"),
        "configuration loaded"
    );

    Ok(config)
}

pub fn read_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Invalid(e.to_string()))
}

fn merge_config(base: &mut AppConfig, overlay: AppConfig) {
    if overlay.openai_api_key.is_some() {
        base.openai_api_key = overlay.openai_api_key;
    }
    if overlay.anthropic_api_key.is_some() {
        base.anthropic_api_key = overlay.anthropic_api_key;
    }
    if overlay.gemini_api_key.is_some() {
        base.gemini_api_key = overlay.gemini_api_key;
    }
    if overlay.google_access_token.is_some() {
        base.google_access_token = overlay.google_access_token;
    }
    if overlay.google_cloud_project.is_some() {
        base.google_cloud_project = overlay.google_cloud_project;
    }
    if overlay.google_cloud_location != default_google_cloud_location() {
        base.google_cloud_location = overlay.google_cloud_location;
    }
    if overlay.data_dir != default_data_dir() {
        base.data_dir = overlay.data_dir;
    }
    if overlay.log_dir != default_log_dir() {
        base.log_dir = overlay.log_dir;
    }
    if overlay.base_urls != BaseUrls::default() {
        base.base_urls = overlay.base_urls;
    }
    if overlay.llm.openai_models != default_openai_models() {
        base.llm.openai_models = overlay.llm.openai_models;
    }
    if overlay.llm.anthropic_models != default_anthropic_models() {
        base.llm.anthropic_models = overlay.llm.anthropic_models;
    }
    if overlay.llm.gemini_models != default_gemini_models() {
        base.llm.gemini_models = overlay.llm.gemini_models;
    }
    if overlay.llm.defaults != DefaultParameters::default() {
        base.llm.defaults = overlay.llm.defaults;
    }
    if overlay.monitoring != MonitoringConfig::default() {
        base.monitoring = overlay.monitoring;
    }
    if overlay.logging.level != default_log_level() {
        base.logging.level = overlay.logging.level;
    }
    if overlay.logging.filename != default_log_filename() {
        base.logging.filename = overlay.logging.filename;
    }
    base.model_costs.merge(&overlay.model_costs);
    if overlay.history_capacity != default_history_capacity() {
        base.history_capacity = overlay.history_capacity;
    }
    if overlay.debug {
        base.debug = true;
    }
}

/// Fill credentials and endpoints from environment variables.
/// The environment only fills fields the config files left unset or at their
/// default; a value set in a config file always wins.
pub fn apply_env(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if config.openai_api_key.is_none() {
        config.openai_api_key = non_empty("OPENAI_API_KEY");
    }
    if config.anthropic_api_key.is_none() {
        config.anthropic_api_key = non_empty("ANTHROPIC_API_KEY");
    }
    if config.gemini_api_key.is_none() {
        config.gemini_api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY"));
    }
    if config.google_access_token.is_none() {
        config.google_access_token = non_empty("GOOGLE_OAUTH_ACCESS_TOKEN");
    }
    if config.google_cloud_project.is_none() {
        config.google_cloud_project = non_empty("GOOGLE_CLOUD_PROJECT");
    }
    if config.google_cloud_location == default_google_cloud_location() {
        if let Some(location) = non_empty("GOOGLE_CLOUD_LOCATION") {
            config.google_cloud_location = location;
        }
    }

    let urls = &mut config.base_urls;
    if urls.openai == default_openai_url() {
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            urls.openai = url;
        }
    }
    if urls.anthropic == default_anthropic_url() {
        if let Some(url) = non_empty("ANTHROPIC_BASE_URL") {
            urls.anthropic = url;
        }
    }
    if urls.gemini == default_gemini_url() {
        if let Some(url) = non_empty("GEMINI_BASE_URL") {
            urls.gemini = url;
        }
    }
    if urls.vertex.is_none() {
        urls.vertex = non_empty("VERTEX_BASE_URL");
    }
}

impl AppConfig {
    /// Ambient credential for a provider, if any is configured.
    pub fn credential_for(&self, provider: ProviderKind) -> Option<Credential> {
        match provider {
            ProviderKind::OpenAI => self.openai_api_key.clone().and_then(Credential::api_key),
            ProviderKind::Anthropic => self.anthropic_api_key.clone().and_then(Credential::api_key),
            ProviderKind::Gemini => self
                .gemini_api_key
                .clone()
                .and_then(Credential::api_key)
                .or_else(|| self.google_access_token.clone().and_then(Credential::access_token)),
        }
    }

    pub fn check_api_keys(&self) -> BTreeMap<ProviderKind, bool> {
        ProviderKind::ALL
            .iter()
            .map(|p| (*p, self.credential_for(*p).is_some()))
            .collect()
    }

    pub fn supported_models(&self, provider: ProviderKind) -> &[String] {
        match provider {
            ProviderKind::OpenAI => &self.llm.openai_models,
            ProviderKind::Anthropic => &self.llm.anthropic_models,
            ProviderKind::Gemini => &self.llm.gemini_models,
        }
    }

    /// Built-in prices with this config's overrides applied.
    pub fn cost_table(&self) -> CostTable {
        let mut table = CostTable::builtin();
        table.merge(&self.model_costs);
        table
    }

    pub fn vertex_base_url(&self) -> String {
        self.base_urls.vertex.clone().unwrap_or_else(|| {
            format!("https://{}-aiplatform.googleapis.com", self.google_cloud_location)
        })
    }

    pub fn data_path(&self) -> PathBuf {
        self.working_dir.join(&self.data_dir)
    }

    pub fn log_path(&self) -> PathBuf {
        self.working_dir.join(&self.log_dir)
    }

    pub fn log_file(&self) -> PathBuf {
        self.log_path().join(&self.logging.filename)
    }

    pub fn setup_directories(&self) -> Result<(), ConfigError> {
        for dir in [self.log_path(), self.data_path()] {
            std::fs::create_dir_all(&dir)
                .map_err(|e| ConfigError::File(format!("{}: {e}", dir.display())))?;
        }
        Ok(())
    }
}
