//! Pre-hoc spend projection.
//!
//! Multiplies an image count by fixed per-image token assumptions and a
//! $/1M-token rate. This is a projection from constants, separate from the
//! measured or estimated usage recorded on each `ProcessingResult`.

use crate::config::{ModelPricing, PricingConfig};
use crate::types::BackendKind;
use serde::Serialize;

/// Projected tokens and USD cost for a number of images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

/// Project the cost of labeling `image_count` images at the given rates.
///
/// `None` when the token totals do not fit in a `u64`.
pub fn estimate(image_count: u64, pricing: &ModelPricing) -> Option<CostEstimate> {
    let input_tokens = image_count.checked_mul(pricing.input_tokens_per_image)?;
    let output_tokens = image_count.checked_mul(pricing.output_tokens_per_image)?;
    let total_tokens = input_tokens.checked_add(output_tokens)?;
    let input_cost = input_tokens as f64 / 1_000_000.0 * pricing.input_per_million;
    let output_cost = output_tokens as f64 / 1_000_000.0 * pricing.output_per_million;
    Some(CostEstimate {
        input_tokens,
        output_tokens,
        total_tokens,
        input_cost,
        output_cost,
        total_cost: input_cost + output_cost,
    })
}

/// Built-in model-specific rates, USD per one million tokens.
const MODEL_RATES: &[(&str, ModelPricing)] = &[
    (
        "gpt-4o",
        ModelPricing {
            input_per_million: 2.50,
            output_per_million: 10.00,
            input_tokens_per_image: 1105,
            output_tokens_per_image: 100,
        },
    ),
    (
        "gpt-4o-mini",
        ModelPricing {
            input_per_million: 0.15,
            output_per_million: 0.60,
            input_tokens_per_image: 1105,
            output_tokens_per_image: 100,
        },
    ),
    (
        "gemini-1.5-flash",
        ModelPricing {
            input_per_million: 0.075,
            output_per_million: 0.30,
            input_tokens_per_image: 300,
            output_tokens_per_image: 100,
        },
    ),
    (
        "gemini-1.5-pro",
        ModelPricing {
            input_per_million: 1.25,
            output_per_million: 5.00,
            input_tokens_per_image: 300,
            output_tokens_per_image: 100,
        },
    ),
    (
        "gemini-2.0-flash",
        ModelPricing {
            input_per_million: 0.10,
            output_per_million: 0.40,
            input_tokens_per_image: 300,
            output_tokens_per_image: 100,
        },
    ),
];

/// Rate lookup: config overrides, then built-in model rates, then the
/// legacy per-backend table.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    overrides: PricingConfig,
}

impl RateTable {
    pub fn new(overrides: PricingConfig) -> Self {
        Self { overrides }
    }

    /// Legacy fixed rates, one per backend.
    pub fn legacy(backend: BackendKind) -> ModelPricing {
        match backend {
            BackendKind::Gpt => ModelPricing {
                input_per_million: 5.00,
                output_per_million: 15.00,
                input_tokens_per_image: 1000,
                output_tokens_per_image: 150,
            },
            BackendKind::Gemini => ModelPricing {
                input_per_million: 0.35,
                output_per_million: 1.05,
                input_tokens_per_image: 258,
                output_tokens_per_image: 150,
            },
        }
    }

    /// Model-specific rate, if this model id is known.
    pub fn for_model(&self, model: &str) -> Option<ModelPricing> {
        let model = model.trim().to_lowercase();
        if let Some(pricing) = self.overrides.models.get(&model) {
            return Some(*pricing);
        }
        MODEL_RATES
            .iter()
            .find(|(id, _)| *id == model)
            .map(|(_, pricing)| *pricing)
    }

    /// Rate for `model` when given and known, otherwise the backend's legacy rate.
    pub fn resolve(&self, backend: BackendKind, model: Option<&str>) -> ModelPricing {
        match model.and_then(|m| self.for_model(m)) {
            Some(pricing) => pricing,
            None => {
                if let Some(model) = model {
                    tracing::debug!("No rate for model '{model}', using legacy {backend} rate");
                }
                Self::legacy(backend)
            }
        }
    }

    /// Project spend for `image_count` images on `backend` / `model`.
    pub fn estimate(
        &self,
        image_count: u64,
        backend: BackendKind,
        model: Option<&str>,
    ) -> Option<CostEstimate> {
        estimate(image_count, &self.resolve(backend, model))
    }

    /// Known model ids, built-in and configured.
    pub fn models(&self) -> Vec<String> {
        let mut ids: Vec<String> = MODEL_RATES.iter().map(|(id, _)| id.to_string()).collect();
        for id in self.overrides.models.keys() {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }
}
