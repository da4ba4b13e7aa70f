use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::generation::TokenUsage;
use crate::model::ProviderKind;

/// Dollar price per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostRate {
    pub input: f64,
    pub output: f64,
}

impl CostRate {
    pub const ZERO: CostRate = CostRate {
        input: 0.0,
        output: 0.0,
    };

    pub fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl CostBreakdown {
    pub fn from_usage(rate: CostRate, usage: &TokenUsage) -> Self {
        let input_cost = round_to(usage.prompt_tokens as f64 / 1000.0 * rate.input, 6);
        let output_cost = round_to(usage.completion_tokens as f64 / 1000.0 * rate.output, 6);
        Self {
            input_cost,
            output_cost,
            total_cost: round_to(input_cost + output_cost, 6),
        }
    }
}

/// Static provider → model → rate lookup.
///
/// Operators keep this current; a missing entry prices a call at zero
/// instead of failing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostTable {
    rates: BTreeMap<ProviderKind, BTreeMap<String, CostRate>>,
}

impl Default for CostTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CostTable {
    pub fn empty() -> Self {
        Self {
            rates: BTreeMap::new(),
        }
    }

    /// Published list prices. Gemini has no entries yet.
    pub fn builtin() -> Self {
        let mut table = Self::empty();

        table.insert(ProviderKind::OpenAI, "gpt-4-turbo-preview", CostRate::new(0.01, 0.03));
        table.insert(ProviderKind::OpenAI, "gpt-4", CostRate::new(0.03, 0.06));
        table.insert(ProviderKind::OpenAI, "gpt-3.5-turbo", CostRate::new(0.0005, 0.0015));

        table.insert(
            ProviderKind::Anthropic,
            "claude-3-5-sonnet-latest",
            CostRate::new(0.003, 0.015),
        );
        table.insert(
            ProviderKind::Anthropic,
            "claude-3-opus-latest",
            CostRate::new(0.015, 0.075),
        );
        table.insert(
            ProviderKind::Anthropic,
            "claude-3-haiku-20240307",
            CostRate::new(0.00025, 0.00125),
        );

        table
    }

    pub fn insert(&mut self, provider: ProviderKind, model: impl Into<String>, rate: CostRate) {
        self.rates
            .entry(provider)
            .or_default()
            .insert(model.into(), rate);
    }

    /// Entries from `overrides` replace or extend this table.
    pub fn merge(&mut self, overrides: &CostTable) {
        for (provider, models) in &overrides.rates {
            for (model, rate) in models {
                self.insert(*provider, model.clone(), *rate);
            }
        }
    }

    pub fn rate(&self, provider: ProviderKind, model: &str) -> Option<CostRate> {
        self.rates.get(&provider)?.get(model).copied()
    }

    pub fn rate_or_zero(&self, provider: ProviderKind, model: &str) -> CostRate {
        self.rate(provider, model).unwrap_or(CostRate::ZERO)
    }

    pub fn cost(&self, provider: ProviderKind, model: &str, usage: &TokenUsage) -> CostBreakdown {
        CostBreakdown::from_usage(self.rate_or_zero(provider, model), usage)
    }

    pub fn is_empty(&self) -> bool {
        self.rates.values().all(|m| m.is_empty())
    }
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
