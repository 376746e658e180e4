//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "batch.batch_size must be > 0".into(),
            ));
        }
        if self.batch.batch_size > self.batch.max_batch_size {
            return Err(ConfigError::ValidationError(format!(
                "batch.batch_size ({}) must not exceed batch.max_batch_size ({})",
                self.batch.batch_size, self.batch.max_batch_size
            )));
        }
        if self.limits.http_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.http_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.fetch_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.fetch_timeout_ms must be > 0".into(),
            ));
        }
        if self.llm.openai.max_tokens == 0 || self.llm.gemini.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "llm.*.max_tokens must be > 0".into(),
            ));
        }
        if self.events.page_base > 1 {
            return Err(ConfigError::ValidationError(
                "events.page_base must be 0 or 1".into(),
            ));
        }
        if self.events.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "events.page_size must be > 0".into(),
            ));
        }
        if !matches!(self.response_log.sink.as_str(), "file" | "tracing") {
            return Err(ConfigError::ValidationError(format!(
                "response_log.sink must be \"file\" or \"tracing\", got \"{}\"",
                self.response_log.sink
            )));
        }
        for (model, pricing) in &self.pricing.models {
            if pricing.input_per_million < 0.0 || pricing.output_per_million < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "pricing.models.{model} rates must be >= 0"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelPricing;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.batch.batch_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_validate_rejects_batch_size_above_max() {
        let mut config = Config::default();
        config.batch.batch_size = 80;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_batch_size"));

        config.batch.max_batch_size = 80;
        assert!(config.validate().is_ok());
        assert_eq!(config.batch.clamp_batch_size(500), 80);
        assert_eq!(config.batch.clamp_batch_size(3), 3);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.fetch_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("fetch_timeout_ms"));
    }

    #[test]
    fn test_validate_rejects_bad_page_base() {
        let mut config = Config::default();
        config.events.page_base = 2;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("page_base"));
    }

    #[test]
    fn test_validate_rejects_negative_price() {
        let mut config = Config::default();
        config.pricing.models.insert(
            "cheap".to_string(),
            ModelPricing {
                input_per_million: -1.0,
                output_per_million: 0.5,
                input_tokens_per_image: 100,
                output_tokens_per_image: 10,
            },
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pricing.models.cheap"));
    }
}
