mod app;
mod noninteractive;
mod output;
mod repl;

use anyhow::{Context, Result};
use clap::Parser;
use observatory_core::config::AppConfig;
use observatory_core::model::{Credential, Environment, ProviderKind};
use observatory_providers::InitOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "llm-observatory",
    version,
    about = "Track tokens, latency and cost across hosted LLM APIs"
)]
struct Cli {
    /// Non-interactive mode: send one prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Provider: openai, anthropic or gemini
    #[arg(short = 'P', long, default_value = "openai")]
    provider: String,

    /// Model to use (defaults to the provider's default model)
    #[arg(short, long)]
    model: Option<String>,

    /// API key (overrides config and environment)
    #[arg(long, env = "LLM_OBSERVATORY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Application id attached to the session
    #[arg(long = "app", env = "LLM_OBSERVATORY_APP_ID")]
    application_id: Option<String>,

    /// Environment tag: dev, test, int or prod
    #[arg(short, long = "env", default_value = "dev")]
    environment: String,

    /// Sampling temperature, 0.0 to 1.0
    #[arg(short, long)]
    temperature: Option<f32>,

    /// Maximum completion tokens
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Working directory
    #[arg(short = 'c', long = "cwd")]
    working_dir: Option<PathBuf>,

    /// Output format for non-interactive mode
    #[arg(short = 'f', long, default_value = "text")]
    output_format: OutputFormat,

    /// Suppress metrics output
    #[arg(short, long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Write the session history to a CSV file in the data directory on exit
    #[arg(long)]
    export: bool,

    /// List configured providers, models and prices, then exit
    #[arg(long)]
    list_models: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let config = observatory_core::config::load_config(cli.working_dir.clone())
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    if let Err(e) = config.setup_directories() {
        eprintln!("\x1b[33mwarning:\x1b[0m {e}");
    }
    init_logging(&config, cli.debug || config.debug);

    if cli.list_models {
        output::render_models(&config);
        return Ok(());
    }

    let provider: ProviderKind = cli.provider.parse()?;
    let environment: Environment = cli.environment.parse()?;

    let options = InitOptions {
        credential: cli.api_key.clone().and_then(Credential::api_key),
        model: cli.model.clone(),
        application_id: cli.application_id.clone(),
        environment,
    };
    let adapter = observatory_providers::create_adapter(&config, provider, options)
        .with_context(|| format!("failed to initialize {provider} adapter"))?;

    let mut app = app::App::new(config, adapter, cli.temperature, cli.max_tokens);

    let outcome = match cli.prompt {
        Some(prompt) => noninteractive::run(&mut app, prompt, cli.output_format, cli.quiet).await,
        None => repl::run(&mut app).await,
    };

    if cli.export {
        match app.export() {
            Ok(path) => eprintln!("\x1b[90mExported session to {}\x1b[0m", path.display()),
            Err(e) => eprintln!("\x1b[31;1m[export failed]\x1b[0m {e}"),
        }
    }

    app.shutdown().await;
    outcome
}

/// Human-readable logs on stderr; JSON lines in the log file when it can be opened.
/// The file keeps `logging.level` so interaction records survive a quiet terminal.
fn init_logging(config: &AppConfig, debug: bool) {
    let level = |fallback: &str| {
        if debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
        }
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(level("warn"));

    let file_layer = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_file())
        .ok()
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(Mutex::new(file))
                .with_filter(level(config.logging.level.as_str()))
        });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();
}
