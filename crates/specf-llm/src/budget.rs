//! Budget guards around LLM usage: hard ceilings on calls per
//! round and per product, plus running USD spend tracked against both the
//! per-product and monthly caps in [`specf_config::LlmConfig`]. Guard state
//! is process-local — the orchestrator constructs a fresh `BudgetGuard` per
//! run and calls [`BudgetGuard::start_product`] when it moves to a new
//! product, and resets its per-product counters each time a run moves on
//! to a new product.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use specf_config::LlmConfig;

#[derive(Debug, thiserror::Error)]
pub enum BudgetError {
    #[error("round call budget exhausted: {used} >= {limit}")]
    RoundCallsExhausted { used: u32, limit: u32 },

    #[error("per-product call budget exhausted: {used} >= {limit}")]
    ProductCallsExhausted { used: u32, limit: u32 },

    #[error("per-product USD budget exhausted: {spent:.4} + {cost:.4} > {limit:.4}")]
    ProductUsdExhausted { spent: f64, cost: f64, limit: f64 },

    #[error("monthly USD budget exhausted: {spent:.4} + {cost:.4} > {limit:.4}")]
    MonthlyUsdExhausted { spent: f64, cost: f64, limit: f64 },
}

/// Tracks LLM call/spend consumption for a single orchestrator run.
pub struct BudgetGuard {
    max_calls_per_round: u32,
    max_calls_per_product: u32,
    per_product_usd_limit: f64,
    monthly_usd_limit: f64,
    calls_this_round: AtomicU32,
    calls_this_product: AtomicU32,
    spent_this_product_usd: Mutex<f64>,
    spent_monthly_usd: Mutex<f64>,
}

impl BudgetGuard {
    #[must_use]
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            max_calls_per_round: config.llm_max_calls_per_round,
            max_calls_per_product: config.llm_max_calls_per_product_total,
            per_product_usd_limit: config.llm_per_product_budget_usd,
            monthly_usd_limit: config.llm_monthly_budget_usd,
            calls_this_round: AtomicU32::new(0),
            calls_this_product: AtomicU32::new(0),
            spent_this_product_usd: Mutex::new(0.0),
            spent_monthly_usd: Mutex::new(0.0),
        }
    }

    /// Reset the per-round counter; called between extraction rounds for
    /// the same product.
    pub fn start_round(&self) {
        self.calls_this_round.store(0, Ordering::SeqCst);
    }

    /// Reset per-product counters; called when the orchestrator moves on
    /// to a new product. Monthly spend is never reset within a run.
    pub fn start_product(&self) {
        self.calls_this_product.store(0, Ordering::SeqCst);
        *self.spent_this_product_usd.lock().expect("budget mutex poisoned") = 0.0;
    }

    /// Reserve capacity for one call of estimated cost `cost_usd`. Must be
    /// called (and must succeed) before issuing the call.
    pub fn try_reserve(&self, cost_usd: f64) -> Result<(), BudgetError> {
        let round_used = self.calls_this_round.load(Ordering::SeqCst);
        if round_used >= self.max_calls_per_round {
            return Err(BudgetError::RoundCallsExhausted { used: round_used, limit: self.max_calls_per_round });
        }
        let product_used = self.calls_this_product.load(Ordering::SeqCst);
        if product_used >= self.max_calls_per_product {
            return Err(BudgetError::ProductCallsExhausted { used: product_used, limit: self.max_calls_per_product });
        }

        let mut product_spent = self.spent_this_product_usd.lock().expect("budget mutex poisoned");
        if *product_spent + cost_usd > self.per_product_usd_limit {
            return Err(BudgetError::ProductUsdExhausted { spent: *product_spent, cost: cost_usd, limit: self.per_product_usd_limit });
        }
        let mut monthly_spent = self.spent_monthly_usd.lock().expect("budget mutex poisoned");
        if *monthly_spent + cost_usd > self.monthly_usd_limit {
            return Err(BudgetError::MonthlyUsdExhausted { spent: *monthly_spent, cost: cost_usd, limit: self.monthly_usd_limit });
        }

        *product_spent += cost_usd;
        *monthly_spent += cost_usd;
        drop(product_spent);
        drop(monthly_spent);
        self.calls_this_round.fetch_add(1, Ordering::SeqCst);
        self.calls_this_product.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[must_use]
    pub fn spent_monthly_usd(&self) -> f64 {
        *self.spent_monthly_usd.lock().expect("budget mutex poisoned")
    }
}
