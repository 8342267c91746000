//! Per-token prices for the models the wrapper knows how to bill.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dollar price per token. Embedding models only have an input price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<f64>,
}

impl ModelPricing {
    pub const fn chat(input: f64, output: f64) -> Self {
        Self {
            input,
            output: Some(output),
        }
    }

    pub const fn embedding(input: f64) -> Self {
        Self {
            input,
            output: None,
        }
    }

    pub fn cost(&self, input_tokens: f64, output_tokens: f64) -> f64 {
        self.input * input_tokens + self.output.unwrap_or(0.0) * output_tokens
    }
}

static BUILTIN_PRICING: std::sync::LazyLock<HashMap<&'static str, ModelPricing>> =
    std::sync::LazyLock::new(|| {
        let mut m = HashMap::new();
        m.insert("gpt-3.5-turbo", ModelPricing::chat(1.5e-6, 2.0e-6));
        m.insert("gpt-4", ModelPricing::chat(3.0e-5, 6.0e-5));
        m.insert("text-embedding-ada-002", ModelPricing::embedding(1.0e-7));
        m
    });

#[derive(Debug, Clone, PartialEq)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            models: BUILTIN_PRICING
                .iter()
                .map(|(name, pricing)| ((*name).to_string(), *pricing))
                .collect(),
        }
    }
}

impl PricingTable {
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    pub fn insert(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.models.insert(model.into(), pricing);
    }

    /// Layer `overrides` on top of this table.
    pub fn extend<I: IntoIterator<Item = (String, ModelPricing)>>(&mut self, overrides: I) {
        self.models.extend(overrides);
    }

    /// Dollar cost of a chat call, or `None` for an unpriced model.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn calculate(&self, model: &str, input_tokens: u64, output_tokens: u64) -> Option<f64> {
        self.get(model)
            .map(|p| p.cost(input_tokens as f64, output_tokens as f64))
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn embedding_cost(&self, model: &str, total_tokens: u64) -> Option<f64> {
        self.get(model).map(|p| p.input * total_tokens as f64)
    }
}
