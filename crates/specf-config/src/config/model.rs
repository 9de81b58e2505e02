//! The config surface: planner budgets, run deadline, concurrency,
//! rate-limit delay, LLM budget guards, aggressive-mode bounds, and the
//! `runProfile`/`outputMode` presets.

use serde::{Deserialize, Serialize};

/// Per-run budgets the `SourcePlanner` enforces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerBudgets {
    pub max_urls_per_product: u32,
    pub max_pages_per_domain: u32,
    pub max_manufacturer_urls_per_product: u32,
    pub max_manufacturer_pages_per_domain: u32,
    pub manufacturer_reserve_urls: u32,
    pub max_candidate_urls: u32,
}

/// LLM batching, caching, and budget-guard configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    pub llm_enabled: bool,
    pub llm_extraction_cache_enabled: bool,
    pub llm_extraction_cache_ttl_ms: u64,
    pub llm_max_calls_per_product_total: u32,
    pub llm_max_calls_per_round: u32,
    pub llm_per_product_budget_usd: f64,
    pub llm_monthly_budget_usd: f64,
}

/// Aggressive-mode bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggressiveConfig {
    pub aggressive_mode_enabled: bool,
    pub aggressive_max_time_per_product_ms: u64,
    pub aggressive_evidence_audit_enabled: bool,
}

/// Named preset that shifts budgets, timeouts, and discovery aggressiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunProfile {
    Fast,
    Standard,
    Thorough,
}

impl Default for RunProfile {
    fn default() -> Self {
        Self::Standard
    }
}

/// Selects which `Storage` backend(s) the run writes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Local,
    S3,
    Dual,
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::Local
    }
}

/// The fully resolved configuration for one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub run_profile: RunProfile,
    pub output_mode: OutputMode,
    pub planner: PlannerBudgets,
    pub llm: LlmConfig,
    pub aggressive: AggressiveConfig,
    pub max_run_seconds: u64,
    pub concurrency: usize,
    pub per_host_min_delay_ms: u64,
}

impl RunProfile {
    /// Budgets, timeouts, and LLM aggressiveness for this preset.
    #[must_use]
    pub fn defaults(self) -> Config {
        match self {
            RunProfile::Fast => Config {
                run_profile: self,
                output_mode: OutputMode::default(),
                planner: PlannerBudgets {
                    max_urls_per_product: 12,
                    max_pages_per_domain: 2,
                    max_manufacturer_urls_per_product: 4,
                    max_manufacturer_pages_per_domain: 2,
                    manufacturer_reserve_urls: 2,
                    max_candidate_urls: 4,
                },
                llm: LlmConfig {
                    llm_enabled: true,
                    llm_extraction_cache_enabled: true,
                    llm_extraction_cache_ttl_ms: 7 * 24 * 60 * 60 * 1000,
                    llm_max_calls_per_product_total: 6,
                    llm_max_calls_per_round: 2,
                    llm_per_product_budget_usd: 0.25,
                    llm_monthly_budget_usd: 200.0,
                },
                aggressive: AggressiveConfig {
                    aggressive_mode_enabled: false,
                    aggressive_max_time_per_product_ms: 30_000,
                    aggressive_evidence_audit_enabled: false,
                },
                max_run_seconds: 120,
                concurrency: 4,
                per_host_min_delay_ms: 500,
            },
            RunProfile::Standard => Config {
                run_profile: self,
                output_mode: OutputMode::default(),
                planner: PlannerBudgets {
                    max_urls_per_product: 30,
                    max_pages_per_domain: 4,
                    max_manufacturer_urls_per_product: 10,
                    max_manufacturer_pages_per_domain: 4,
                    manufacturer_reserve_urls: 6,
                    max_candidate_urls: 10,
                },
                llm: LlmConfig {
                    llm_enabled: true,
                    llm_extraction_cache_enabled: true,
                    llm_extraction_cache_ttl_ms: 7 * 24 * 60 * 60 * 1000,
                    llm_max_calls_per_product_total: 16,
                    llm_max_calls_per_round: 4,
                    llm_per_product_budget_usd: 0.75,
                    llm_monthly_budget_usd: 500.0,
                },
                aggressive: AggressiveConfig {
                    aggressive_mode_enabled: true,
                    aggressive_max_time_per_product_ms: 90_000,
                    aggressive_evidence_audit_enabled: true,
                },
                max_run_seconds: 300,
                concurrency: 6,
                per_host_min_delay_ms: 750,
            },
            RunProfile::Thorough => Config {
                run_profile: self,
                output_mode: OutputMode::default(),
                planner: PlannerBudgets {
                    max_urls_per_product: 80,
                    max_pages_per_domain: 8,
                    max_manufacturer_urls_per_product: 25,
                    max_manufacturer_pages_per_domain: 8,
                    manufacturer_reserve_urls: 15,
                    max_candidate_urls: 25,
                },
                llm: LlmConfig {
                    llm_enabled: true,
                    llm_extraction_cache_enabled: true,
                    llm_extraction_cache_ttl_ms: 7 * 24 * 60 * 60 * 1000,
                    llm_max_calls_per_product_total: 40,
                    llm_max_calls_per_round: 8,
                    llm_per_product_budget_usd: 2.0,
                    llm_monthly_budget_usd: 1500.0,
                },
                aggressive: AggressiveConfig {
                    aggressive_mode_enabled: true,
                    aggressive_max_time_per_product_ms: 240_000,
                    aggressive_evidence_audit_enabled: true,
                },
                max_run_seconds: 900,
                concurrency: 8,
                per_host_min_delay_ms: 1000,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        RunProfile::default().defaults()
    }
}
