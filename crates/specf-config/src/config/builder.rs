//! Assembles the final [`Config`] in CLI > file > env > defaults order.

use camino::Utf8PathBuf;

use super::discovery::discover_config_path;
use super::model::{Config, RunProfile};
use super::sources::ConfigOverrides;
use super::validation::validate;
use specf_utils::error::ConfigError;

#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    file_path: Option<Utf8PathBuf>,
    cli: ConfigOverrides,
    skip_env: bool,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this file instead of discovering one.
    #[must_use]
    pub fn with_file(mut self, path: Utf8PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }

    /// CLI-supplied overrides; these win over file and env.
    #[must_use]
    pub fn with_cli_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.cli = overrides;
        self
    }

    /// Test hook: skip reading `SPEC_FACTORY_*` environment variables.
    #[must_use]
    pub fn skip_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let file_overrides = match self.file_path.clone().or_else(discover_config_path) {
            Some(path) => {
                let text = std::fs::read_to_string(path.as_std_path())
                    .map_err(|e| ConfigError::InvalidFile(format!("{path}: {e}")))?;
                ConfigOverrides::from_toml_str(&text).map_err(|e| ConfigError::InvalidFile(format!("{path}: {e}")))?
            }
            None => ConfigOverrides::default(),
        };
        let env_overrides = if self.skip_env { ConfigOverrides::default() } else { ConfigOverrides::from_env() };

        let profile = self.cli.run_profile.or(env_overrides.run_profile).or(file_overrides.run_profile).unwrap_or(RunProfile::Standard);
        let mut config = profile.defaults();

        apply(&mut config, &file_overrides);
        apply(&mut config, &env_overrides);
        apply(&mut config, &self.cli);

        validate(&config)?;
        Ok(config)
    }
}

fn apply(config: &mut Config, o: &ConfigOverrides) {
    if let Some(v) = o.output_mode {
        config.output_mode = v;
    }
    if let Some(v) = o.max_urls_per_product {
        config.planner.max_urls_per_product = v;
    }
    if let Some(v) = o.max_pages_per_domain {
        config.planner.max_pages_per_domain = v;
    }
    if let Some(v) = o.max_manufacturer_urls_per_product {
        config.planner.max_manufacturer_urls_per_product = v;
    }
    if let Some(v) = o.max_manufacturer_pages_per_domain {
        config.planner.max_manufacturer_pages_per_domain = v;
    }
    if let Some(v) = o.manufacturer_reserve_urls {
        config.planner.manufacturer_reserve_urls = v;
    }
    if let Some(v) = o.max_candidate_urls {
        config.planner.max_candidate_urls = v;
    }
    if let Some(v) = o.max_run_seconds {
        config.max_run_seconds = v;
    }
    if let Some(v) = o.concurrency {
        config.concurrency = v;
    }
    if let Some(v) = o.per_host_min_delay_ms {
        config.per_host_min_delay_ms = v;
    }
    if let Some(v) = o.llm_enabled {
        config.llm.llm_enabled = v;
    }
    if let Some(v) = o.llm_extraction_cache_enabled {
        config.llm.llm_extraction_cache_enabled = v;
    }
    if let Some(v) = o.llm_extraction_cache_ttl_ms {
        config.llm.llm_extraction_cache_ttl_ms = v;
    }
    if let Some(v) = o.llm_max_calls_per_product_total {
        config.llm.llm_max_calls_per_product_total = v;
    }
    if let Some(v) = o.llm_max_calls_per_round {
        config.llm.llm_max_calls_per_round = v;
    }
    if let Some(v) = o.llm_per_product_budget_usd {
        config.llm.llm_per_product_budget_usd = v;
    }
    if let Some(v) = o.llm_monthly_budget_usd {
        config.llm.llm_monthly_budget_usd = v;
    }
    if let Some(v) = o.aggressive_mode_enabled {
        config.aggressive.aggressive_mode_enabled = v;
    }
    if let Some(v) = o.aggressive_max_time_per_product_ms {
        config.aggressive.aggressive_max_time_per_product_ms = v;
    }
    if let Some(v) = o.aggressive_evidence_audit_enabled {
        config.aggressive.aggressive_evidence_audit_enabled = v;
    }
}
