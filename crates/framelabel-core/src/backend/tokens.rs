//! Token accounting policy.
//!
//! Vendor-reported usage is authoritative. When a vendor reports nothing the
//! counts are estimated from character length, and the result is tagged as
//! such. The two sources are never blended.

use crate::types::TokenUsage;

/// Fixed input-token allowance for one inline image.
pub const IMAGE_TOKEN_ALLOWANCE: u64 = 258;

/// Roughly four characters per token.
pub fn estimate_text_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

/// Estimate usage for one prompt + image call that produced `response`.
pub fn estimate_usage(prompt: &str, response: &str) -> TokenUsage {
    TokenUsage::estimated(
        estimate_text_tokens(prompt) + IMAGE_TOKEN_ALLOWANCE,
        estimate_text_tokens(response),
    )
}

/// Prefer an actual reading; fall back to the estimate only when absent.
pub fn resolve_usage(actual: Option<TokenUsage>, prompt: &str, response: &str) -> TokenUsage {
    actual.unwrap_or_else(|| estimate_usage(prompt, response))
}
