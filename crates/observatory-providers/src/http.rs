use std::time::Duration;

use observatory_core::error::{ConfigError, ProviderError};
use reqwest::{Client, Response};

pub(crate) fn build_client(timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::Client(e.to_string()))
}

pub(crate) fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Http(e.to_string())
    }
}

/// Decodes a 2xx body, or maps the status onto a [`ProviderError`].
pub(crate) async fn read_json(resp: Response) -> Result<serde_json::Value, ProviderError> {
    let status = resp.status();

    // Retry-After is only a hint for the logs; backoff stays on its own schedule.
    let retry_after_ms = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000));

    let body = resp.text().await.map_err(transport_error)?;

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()));
    }

    if status.as_u16() == 429 {
        return Err(ProviderError::RateLimited {
            retry_after_ms: retry_after_ms.unwrap_or(0),
        });
    }

    Err(ProviderError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// Pulls `error.message` out of a JSON error body, else the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["message"].as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Copies provider-specific options into a JSON object body.
pub(crate) fn merge_extra(
    target: &mut serde_json::Value,
    extra: &serde_json::Map<String, serde_json::Value>,
) {
    if let Some(obj) = target.as_object_mut() {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
}
