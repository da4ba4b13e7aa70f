use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::generation::GenerationResult;
use crate::model::ProviderKind;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
pub const PROMPT_PREVIEW_CHARS: usize = 100;
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub provider: ProviderKind,
    pub model: String,
    /// First 100 characters of the prompt, with `...` when cut.
    pub prompt: String,
    pub total_tokens: u64,
    pub response_time: f64,
    pub total_cost: f64,
    pub tokens_per_second: f64,
    pub full_prompt: String,
    pub full_response: String,
    pub request_json: String,
    pub response_json: String,
}

impl HistoryEntry {
    pub fn from_result(prompt: &str, result: &GenerationResult) -> Self {
        let meta = &result.metadata;
        let timestamp = Utc::now();
        let request_json = serde_json::json!({
            "provider": meta.provider,
            "model": meta.model,
            "prompt": prompt,
            "timestamp": timestamp.to_rfc3339(),
        })
        .to_string();
        let response_json = serde_json::to_string(result).unwrap_or_default();

        Self {
            timestamp,
            provider: meta.provider,
            model: meta.model.clone(),
            prompt: truncate_prompt(prompt),
            total_tokens: meta.tokens.total_tokens,
            response_time: meta.performance.response_time,
            total_cost: meta.costs.total_cost,
            tokens_per_second: meta.performance.tokens_per_second,
            full_prompt: prompt.to_string(),
            full_response: result.response.clone(),
            request_json,
            response_json,
        }
    }
}

pub fn truncate_prompt(prompt: &str) -> String {
    if prompt.chars().count() > PROMPT_PREVIEW_CHARS {
        let cut: String = prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();
        format!("{cut}...")
    } else {
        prompt.to_string()
    }
}

/// Flat projection of a history entry, one per table/CSV row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    pub timestamp: String,
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub total_tokens: u64,
    pub response_time: f64,
    pub total_cost: f64,
    pub tokens_per_second: f64,
    pub full_prompt: String,
    pub full_response: String,
    pub request_json: String,
    pub response_json: String,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(e: &HistoryEntry) -> Self {
        Self {
            timestamp: e.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            provider: e.provider.to_string(),
            model: e.model.clone(),
            prompt: e.prompt.clone(),
            total_tokens: e.total_tokens,
            response_time: e.response_time,
            total_cost: e.total_cost,
            tokens_per_second: e.tokens_per_second,
            full_prompt: e.full_prompt.clone(),
            full_response: e.full_response.clone(),
            request_json: e.request_json.clone(),
            response_json: e.response_json.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderSummary {
    pub provider: ProviderKind,
    pub calls: usize,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub mean_response_time: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SessionSummary {
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub error_rate: f64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub mean_response_time: f64,
    /// Averaged over the buffered entries only
    pub mean_tokens_per_second: f64,
}

/// Rolling log of recent calls. Oldest entries are evicted first once
/// `capacity` is exceeded; the running totals cover every recorded call.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    successes: u64,
    failures: u64,
    total_tokens: u64,
    total_cost: f64,
    response_time_sum: f64,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            successes: 0,
            failures: 0,
            total_tokens: 0,
            total_cost: 0.0,
            response_time_sum: 0.0,
        }
    }

    /// Returns the evicted entry, if the buffer was full.
    pub fn append(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        self.successes += 1;
        self.total_tokens += entry.total_tokens;
        self.total_cost += entry.total_cost;
        self.response_time_sum += entry.response_time;

        self.entries.push_back(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        }
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_table(&self) -> Vec<HistoryRow> {
        self.entries.iter().map(HistoryRow::from).collect()
    }

    pub fn provider_summary(&self) -> Vec<ProviderSummary> {
        let mut grouped: BTreeMap<ProviderKind, Vec<&HistoryEntry>> = BTreeMap::new();
        for entry in &self.entries {
            grouped.entry(entry.provider).or_default().push(entry);
        }

        grouped
            .into_iter()
            .map(|(provider, entries)| {
                let calls = entries.len();
                ProviderSummary {
                    provider,
                    calls,
                    total_tokens: entries.iter().map(|e| e.total_tokens).sum(),
                    total_cost: entries.iter().map(|e| e.total_cost).sum(),
                    mean_response_time: entries.iter().map(|e| e.response_time).sum::<f64>()
                        / calls as f64,
                }
            })
            .collect()
    }

    pub fn session_summary(&self) -> SessionSummary {
        let attempted = self.successes + self.failures;
        let error_rate = if attempted == 0 {
            0.0
        } else {
            self.failures as f64 / attempted as f64
        };
        let mean_response_time = if self.successes == 0 {
            0.0
        } else {
            self.response_time_sum / self.successes as f64
        };
        let mean_tokens_per_second = if self.entries.is_empty() {
            0.0
        } else {
            self.entries.iter().map(|e| e.tokens_per_second).sum::<f64>()
                / self.entries.len() as f64
        };

        SessionSummary {
            successful_calls: self.successes,
            failed_calls: self.failures,
            error_rate,
            total_tokens: self.total_tokens,
            total_cost: self.total_cost,
            mean_response_time,
            mean_tokens_per_second,
        }
    }
}
