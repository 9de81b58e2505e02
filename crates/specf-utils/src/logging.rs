//! Logging and observability infrastructure for `spec-factory`.
//!
//! Structured logging via `tracing`, with secret redaction applied to any
//! error message before it reaches stdout/stderr or the event log.

use std::io::IsTerminal;

use tracing::{Level, error, info, span};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use specf_redaction::SecretRedactor;

/// Check if colored output should be used.
///
/// Returns true only if stdout is a terminal and `NO_COLOR` is unset.
#[must_use]
pub fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Initialize the tracing subscriber for structured logging.
///
/// `verbose` switches the default filter from `info,warn` to `debug,info`
/// when `RUST_LOG` is not set, and turns on span-close events.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("spec_factory=debug,info")
            } else {
                EnvFilter::try_new("spec_factory=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let layer = fmt::layer()
        .with_target(verbose)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .compact();

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.with_span_events(FmtSpan::CLOSE))
            .try_init()?;
    } else {
        tracing_subscriber::registry().with(env_filter).with(layer).try_init()?;
    }

    Ok(())
}

/// Create a span for a single product's run through the orchestrator loop.
#[must_use]
pub fn product_span(product_id: &str, run_id: &str) -> tracing::Span {
    span!(
        Level::INFO,
        "product_run",
        product_id = %product_id,
        run_id = %run_id,
    )
}

/// Log the start of a pipeline stage for a product.
pub fn log_stage_start(product_id: &str, stage: &str) {
    info!(product_id = %product_id, stage = %stage, "stage started");
}

/// Log the completion of a pipeline stage for a product, with duration.
pub fn log_stage_complete(product_id: &str, stage: &str, duration_ms: u128) {
    info!(product_id = %product_id, stage = %stage, duration_ms, "stage completed");
}

/// Log a recoverable stage failure. The message is redacted before logging,
/// since stage errors may embed fetched page content or LLM output.
pub fn log_stage_error(product_id: &str, stage: &str, message: &str, redactor: &SecretRedactor) {
    let sanitized = match redactor.redact_content(message, "<log>") {
        Ok(result) => result.content,
        Err(_) => "[redaction failed]".to_string(),
    };
    error!(product_id = %product_id, stage = %stage, error = %sanitized, "stage failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_span_carries_ids() {
        let span = product_span("mouse-acme-x1", "run-1");
        assert_eq!(span.metadata().unwrap().name(), "product_run");
    }
}
