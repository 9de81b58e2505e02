//! Sanity checks applied to a fully merged [`Config`] before it's used.

use specf_utils::error::ConfigError;

use super::model::Config;

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.planner.max_urls_per_product == 0 {
        return Err(ConfigError::InvalidValue {
            key: "maxUrlsPerProduct".to_string(),
            value: "0".to_string(),
        });
    }
    if config.planner.manufacturer_reserve_urls > config.planner.max_urls_per_product {
        return Err(ConfigError::InvalidValue {
            key: "manufacturerReserveUrls".to_string(),
            value: format!("{} exceeds maxUrlsPerProduct", config.planner.manufacturer_reserve_urls),
        });
    }
    if config.planner.max_manufacturer_urls_per_product > config.planner.max_urls_per_product {
        return Err(ConfigError::InvalidValue {
            key: "maxManufacturerUrlsPerProduct".to_string(),
            value: format!("{} exceeds maxUrlsPerProduct", config.planner.max_manufacturer_urls_per_product),
        });
    }
    if config.concurrency == 0 {
        return Err(ConfigError::InvalidValue { key: "concurrency".to_string(), value: "0".to_string() });
    }
    if config.max_run_seconds == 0 {
        return Err(ConfigError::InvalidValue { key: "maxRunSeconds".to_string(), value: "0".to_string() });
    }
    if config.llm.llm_per_product_budget_usd < 0.0 {
        return Err(ConfigError::InvalidValue {
            key: "llmPerProductBudgetUsd".to_string(),
            value: config.llm.llm_per_product_budget_usd.to_string(),
        });
    }
    if config.llm.llm_monthly_budget_usd < config.llm.llm_per_product_budget_usd {
        return Err(ConfigError::InvalidValue {
            key: "llmMonthlyBudgetUsd".to_string(),
            value: "monthly budget is smaller than the per-product budget".to_string(),
        });
    }
    Ok(())
}
