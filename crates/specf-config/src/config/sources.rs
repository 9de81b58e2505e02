//! Partial configuration as read from a TOML file or the process
//! environment. Every field is optional; [`super::builder::ConfigBuilder`]
//! applies them over the `runProfile` defaults in CLI > file > env order.

use serde::Deserialize;

use super::model::{OutputMode, RunProfile};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverrides {
    pub run_profile: Option<RunProfile>,
    pub output_mode: Option<OutputMode>,
    pub max_urls_per_product: Option<u32>,
    pub max_pages_per_domain: Option<u32>,
    pub max_manufacturer_urls_per_product: Option<u32>,
    pub max_manufacturer_pages_per_domain: Option<u32>,
    pub manufacturer_reserve_urls: Option<u32>,
    pub max_candidate_urls: Option<u32>,
    pub max_run_seconds: Option<u64>,
    pub concurrency: Option<usize>,
    pub per_host_min_delay_ms: Option<u64>,
    pub llm_enabled: Option<bool>,
    pub llm_extraction_cache_enabled: Option<bool>,
    pub llm_extraction_cache_ttl_ms: Option<u64>,
    pub llm_max_calls_per_product_total: Option<u32>,
    pub llm_max_calls_per_round: Option<u32>,
    pub llm_per_product_budget_usd: Option<f64>,
    pub llm_monthly_budget_usd: Option<f64>,
    pub aggressive_mode_enabled: Option<bool>,
    pub aggressive_max_time_per_product_ms: Option<u64>,
    pub aggressive_evidence_audit_enabled: Option<bool>,
}

impl ConfigOverrides {
    /// Parse overrides from a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Read overrides from `SPEC_FACTORY_*` environment variables. Only
    /// variables that parse cleanly are applied; malformed values are
    /// ignored rather than failing the whole run (config errors from env
    /// noise would be surprising for an operator who only set one var).
    #[must_use]
    pub fn from_env() -> Self {
        let mut o = Self::default();
        macro_rules! env_parse {
            ($field:ident, $env:literal) => {
                if let Ok(v) = std::env::var($env) {
                    if let Ok(parsed) = v.parse() {
                        o.$field = Some(parsed);
                    }
                }
            };
        }
        env_parse!(max_urls_per_product, "SPEC_FACTORY_MAX_URLS_PER_PRODUCT");
        env_parse!(max_pages_per_domain, "SPEC_FACTORY_MAX_PAGES_PER_DOMAIN");
        env_parse!(max_manufacturer_urls_per_product, "SPEC_FACTORY_MAX_MANUFACTURER_URLS_PER_PRODUCT");
        env_parse!(max_manufacturer_pages_per_domain, "SPEC_FACTORY_MAX_MANUFACTURER_PAGES_PER_DOMAIN");
        env_parse!(manufacturer_reserve_urls, "SPEC_FACTORY_MANUFACTURER_RESERVE_URLS");
        env_parse!(max_candidate_urls, "SPEC_FACTORY_MAX_CANDIDATE_URLS");
        env_parse!(max_run_seconds, "SPEC_FACTORY_MAX_RUN_SECONDS");
        env_parse!(concurrency, "SPEC_FACTORY_CONCURRENCY");
        env_parse!(per_host_min_delay_ms, "SPEC_FACTORY_PER_HOST_MIN_DELAY_MS");
        env_parse!(llm_enabled, "SPEC_FACTORY_LLM_ENABLED");
        env_parse!(llm_extraction_cache_enabled, "SPEC_FACTORY_LLM_EXTRACTION_CACHE_ENABLED");
        env_parse!(llm_extraction_cache_ttl_ms, "SPEC_FACTORY_LLM_EXTRACTION_CACHE_TTL_MS");
        env_parse!(llm_max_calls_per_product_total, "SPEC_FACTORY_LLM_MAX_CALLS_PER_PRODUCT_TOTAL");
        env_parse!(llm_max_calls_per_round, "SPEC_FACTORY_LLM_MAX_CALLS_PER_ROUND");
        env_parse!(llm_per_product_budget_usd, "SPEC_FACTORY_LLM_PER_PRODUCT_BUDGET_USD");
        env_parse!(llm_monthly_budget_usd, "SPEC_FACTORY_LLM_MONTHLY_BUDGET_USD");
        env_parse!(aggressive_mode_enabled, "SPEC_FACTORY_AGGRESSIVE_MODE_ENABLED");
        env_parse!(aggressive_max_time_per_product_ms, "SPEC_FACTORY_AGGRESSIVE_MAX_TIME_PER_PRODUCT_MS");
        env_parse!(aggressive_evidence_audit_enabled, "SPEC_FACTORY_AGGRESSIVE_EVIDENCE_AUDIT_ENABLED");

        if let Ok(v) = std::env::var("SPEC_FACTORY_RUN_PROFILE") {
            o.run_profile = match v.to_lowercase().as_str() {
                "fast" => Some(RunProfile::Fast),
                "standard" => Some(RunProfile::Standard),
                "thorough" => Some(RunProfile::Thorough),
                _ => None,
            };
        }
        if let Ok(v) = std::env::var("SPEC_FACTORY_OUTPUT_MODE") {
            o.output_mode = match v.to_lowercase().as_str() {
                "local" => Some(OutputMode::Local),
                "s3" => Some(OutputMode::S3),
                "dual" => Some(OutputMode::Dual),
                _ => None,
            };
        }
        o
    }
}
