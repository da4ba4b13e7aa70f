use serde::{Deserialize, Serialize};
use std::fmt;

use crate::history::SessionSummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_metrics")]
    pub metrics_to_track: Vec<String>,
    #[serde(default)]
    pub alert_thresholds: AlertThresholds,
}

fn default_metrics() -> Vec<String> {
    ["response_time", "token_usage", "cost", "error_rate"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_to_track: default_metrics(),
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// Seconds
    #[serde(default = "default_response_time")]
    pub response_time: f64,
    /// Failed calls / all calls
    #[serde(default = "default_error_rate")]
    pub error_rate: f64,
    /// Dollars per session
    #[serde(default = "default_cost_limit")]
    pub cost_limit: f64,
}

fn default_response_time() -> f64 {
    5.0
}

fn default_error_rate() -> f64 {
    0.1
}

fn default_cost_limit() -> f64 {
    10.0
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            response_time: default_response_time(),
            error_rate: default_error_rate(),
            cost_limit: default_cost_limit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    SlowResponse { response_time: f64, threshold: f64 },
    ErrorRateExceeded { error_rate: f64, threshold: f64 },
    CostLimitExceeded { total_cost: f64, threshold: f64 },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SlowResponse {
                response_time,
                threshold,
            } => write!(f, "slow response: {response_time:.2}s (threshold {threshold:.2}s)"),
            Self::ErrorRateExceeded {
                error_rate,
                threshold,
            } => write!(
                f,
                "error rate {:.0}% exceeds {:.0}%",
                error_rate * 100.0,
                threshold * 100.0
            ),
            Self::CostLimitExceeded {
                total_cost,
                threshold,
            } => write!(f, "session cost ${total_cost:.4} exceeds limit ${threshold:.2}"),
        }
    }
}

impl MonitoringConfig {
    fn tracks(&self, metric: &str) -> bool {
        self.metrics_to_track.iter().any(|m| m == metric)
    }

    /// Thresholds crossed by the latest call and the session so far.
    pub fn evaluate(&self, summary: &SessionSummary, last_response_time: Option<f64>) -> Vec<Alert> {
        let t = &self.alert_thresholds;
        let mut alerts = Vec::new();

        if self.tracks("response_time") {
            if let Some(rt) = last_response_time.filter(|rt| *rt > t.response_time) {
                alerts.push(Alert::SlowResponse {
                    response_time: rt,
                    threshold: t.response_time,
                });
            }
        }
        if self.tracks("error_rate") && summary.error_rate > t.error_rate {
            alerts.push(Alert::ErrorRateExceeded {
                error_rate: summary.error_rate,
                threshold: t.error_rate,
            });
        }
        if self.tracks("cost") && summary.total_cost > t.cost_limit {
            alerts.push(Alert::CostLimitExceeded {
                total_cost: summary.total_cost,
                threshold: t.cost_limit,
            });
        }

        alerts
    }
}
