use observatory_core::config::AppConfig;
use observatory_core::generation::{GenerationResult, ModelInfo};
use observatory_core::history::{History, ProviderSummary, SessionSummary};
use observatory_core::model::ProviderKind;
use observatory_core::monitoring::Alert;

/// Response on stdout, metrics on stderr.
pub fn render_result(result: &GenerationResult, quiet: bool) {
    println!("{}", result.response);
    if quiet {
        return;
    }

    let meta = &result.metadata;
    eprintln!(
        "\n\x1b[90m[{} / {}] tokens {} in / {} out / {} total\x1b[0m",
        meta.provider,
        meta.model,
        format_tokens(meta.tokens.prompt_tokens),
        format_tokens(meta.tokens.completion_tokens),
        format_tokens(meta.tokens.total_tokens),
    );
    eprintln!(
        "\x1b[90m[cost] ${:.6} (in ${:.6}, out ${:.6})  [time] {:.3}s, {:.2} tok/s{}\x1b[0m",
        meta.costs.total_cost,
        meta.costs.input_cost,
        meta.costs.output_cost,
        meta.performance.response_time,
        meta.performance.tokens_per_second,
        retry_note(meta.performance.retry_count),
    );
}

fn retry_note(retries: u32) -> String {
    match retries {
        0 => String::new(),
        1 => ", 1 retry".into(),
        n => format!(", {n} retries"),
    }
}

pub fn render_alerts(alerts: &[Alert]) {
    for alert in alerts {
        eprintln!("\x1b[33;1m[alert]\x1b[0m {alert}");
    }
}

pub fn render_session_summary(summary: &SessionSummary) {
    eprintln!("\x1b[1;36m  Session\x1b[0m");
    eprintln!(
        "    calls {} ok / {} failed ({:.1}% errors)",
        summary.successful_calls,
        summary.failed_calls,
        summary.error_rate * 100.0
    );
    eprintln!(
        "    tokens {}   cost ${:.6}",
        format_tokens(summary.total_tokens),
        summary.total_cost
    );
    eprintln!(
        "    mean {:.3}s per call, {:.2} tok/s",
        summary.mean_response_time, summary.mean_tokens_per_second
    );
}

pub fn render_provider_summary(rows: &[ProviderSummary]) {
    if rows.is_empty() {
        eprintln!("\x1b[90m  No calls recorded yet.\x1b[0m");
        return;
    }
    eprintln!(
        "\x1b[1m  {:<10} {:>6} {:>10} {:>12} {:>10}\x1b[0m",
        "provider", "calls", "tokens", "cost", "mean time"
    );
    for row in rows {
        eprintln!(
            "  {:<10} {:>6} {:>10} {:>12} {:>9.3}s",
            row.provider.to_string(),
            row.calls,
            format_tokens(row.total_tokens),
            format!("${:.6}", row.total_cost),
            row.mean_response_time,
        );
    }
}

pub fn render_history(history: &History) {
    if history.is_empty() {
        eprintln!("\x1b[90m  History is empty.\x1b[0m");
        return;
    }
    for row in history.to_table() {
        eprintln!(
            "  \x1b[90m{}\x1b[0m {:<9} {:<26} {:>7} {:>8.3}s ${:.6}  {}",
            row.timestamp,
            row.provider,
            row.model,
            row.total_tokens,
            row.response_time,
            row.total_cost,
            row.prompt,
        );
    }
    eprintln!(
        "\x1b[90m  {} of {} slots used\x1b[0m",
        history.len(),
        history.capacity()
    );
}

pub fn render_model_info(info: &ModelInfo) {
    eprintln!(
        "\x1b[1;36m  {} / {}\x1b[0m  session {}",
        info.provider, info.model, info.session_info.session_id
    );
    eprintln!(
        "    app {}  env {}  price ${}/1K in, ${}/1K out",
        info.session_info.application_id,
        info.session_info.environment,
        info.cost_info.input_cost,
        info.cost_info.output_cost
    );
    eprintln!(
        "    temperature {}  max_tokens {}  retries {}",
        info.default_parameters.temperature,
        info.capabilities.max_tokens,
        info.default_parameters.retry_attempts
    );
}

pub fn render_models(config: &AppConfig) {
    let keys = config.check_api_keys();
    let costs = config.cost_table();
    for provider in ProviderKind::ALL {
        let status = if keys.get(&provider).copied().unwrap_or(false) {
            "\x1b[32mcredentials found\x1b[0m"
        } else {
            "\x1b[31mno credentials\x1b[0m"
        };
        println!("\x1b[1m{provider}\x1b[0m ({status})");
        for model in config.supported_models(provider) {
            let marker = if model == provider.default_model() {
                " (default)"
            } else {
                ""
            };
            match costs.rate(provider, model) {
                Some(rate) => println!(
                    "  {model:<28} ${}/1K in, ${}/1K out{marker}",
                    rate.input, rate.output
                ),
                None => println!("  {model:<28} no price set{marker}"),
            }
        }
    }
}

pub fn format_tokens(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        format!("{n}")
    }
}
