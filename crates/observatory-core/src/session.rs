use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub total_requests: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
}

/// Immutable copy of a session's identity and running totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub application_id: String,
    pub environment: String,
    pub created_at: DateTime<Utc>,
    pub metrics: SessionMetrics,
}

/// Per-adapter cumulative metrics. Counters only grow.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    id: String,
    application_id: String,
    environment: Environment,
    created_at: DateTime<Utc>,
    metrics: SessionMetrics,
}

pub const DEFAULT_APPLICATION_ID: &str = "default-app";

impl SessionTracker {
    pub fn new(application_id: Option<String>, environment: Environment) -> Self {
        let application_id = application_id
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_APPLICATION_ID.into());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            application_id,
            environment,
            created_at: Utc::now(),
            metrics: SessionMetrics::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn record(&mut self, tokens: u64, cost: f64) {
        self.metrics.total_requests += 1;
        self.metrics.total_tokens += tokens;
        // A negative cost would break monotonicity.
        self.metrics.total_cost += cost.max(0.0);
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics
    }

    pub fn snapshot(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            application_id: self.application_id.clone(),
            environment: self.environment.tag().to_string(),
            created_at: self.created_at,
            metrics: self.metrics,
        }
    }
}
