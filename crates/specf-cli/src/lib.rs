//! `spec-factory` CLI surface: `run --input <jobKey>`, the
//! `test-mode` fixture-driven harness, and `product-reconcile`.
//!
//! Every command shares one assembled [`specf_config::Config`], storage
//! backend, event sink, rate limiter, and rules engine; only `run` and
//! `test-mode run` additionally need the fixture-backed fetcher, since
//! this workspace carries no real HTTP/PDF client.

mod fixtures;

use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use specf_catalog::CatalogStore;
use specf_config::{Config, ConfigBuilder, ConfigOverrides, RunProfile};
use specf_events::spawn_event_writer;
use specf_orchestrator::fetch::FixtureFetcher;
use specf_orchestrator::RunContext;
use specf_ratelimit::PerHostRateLimiter;
use specf_rules::enum_alias::EnumAliasTable;
use specf_rules::FieldRulesEngine;
use specf_storage::{LocalFsStorage, Storage};
use specf_utils::exit_codes::ExitCode;
use specf_utils::paths::workspace_root;
use specf_utils::types::ProductJob;

use crate::fixtures::{generate_fixtures, validate_fixtures, FixtureStore};

#[derive(Parser, Debug)]
#[command(name = "spec-factory", version, about = "Discover, fetch, and extract typed product specification records.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a `spec-factory.toml` config file; overrides discovery.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// `fast`, `standard`, or `thorough`; overrides the config/default profile.
    #[arg(long, global = true)]
    pub run_profile: Option<String>,

    /// Emit debug-level logs.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the extraction pipeline for one product job.
    Run {
        /// Storage key of the product job, e.g. `specs/inputs/mouse/products/mouse-razer-x.json`.
        #[arg(long)]
        input: String,
    },
    /// Fixture-driven test harness: materialize and run synthetic jobs without a network or LLM.
    TestMode {
        #[command(subcommand)]
        action: TestModeAction,
    },
    /// Scan a category's input jobs for fabricated-variant orphans and delete them.
    ProductReconcile {
        #[arg(long)]
        category: String,
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum TestModeAction {
    /// Register a synthetic product job via the catalog (no fixtures yet).
    Create {
        #[arg(long)]
        category: String,
        #[arg(long)]
        brand: String,
        #[arg(long)]
        model: String,
        #[arg(long, default_value = "")]
        variant: String,
        #[arg(long = "seed-url")]
        seed_urls: Vec<String>,
    },
    /// Synthesize canned page bodies for every seed URL on an existing job.
    Generate {
        #[arg(long)]
        input: String,
    },
    /// Run the pipeline for a job using its generated/hand-authored fixtures.
    Run {
        #[arg(long)]
        input: String,
    },
    /// Report any seed URL missing a fixture entry.
    Validate {
        #[arg(long)]
        input: String,
    },
    /// Delete a category's test fixtures (leaves the catalog/job untouched).
    Wipe {
        #[arg(long)]
        category: String,
    },
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut overrides = ConfigOverrides::default();
    if let Some(profile) = cli.run_profile.as_deref() {
        overrides.run_profile = Some(match profile.to_lowercase().as_str() {
            "fast" => RunProfile::Fast,
            "standard" => RunProfile::Standard,
            "thorough" => RunProfile::Thorough,
            other => anyhow::bail!("unknown --run-profile '{other}' (expected fast, standard, or thorough)"),
        });
    }

    let mut builder = ConfigBuilder::new().with_cli_overrides(overrides);
    if let Some(path) = &cli.config {
        builder = builder.with_file(path.clone());
    }
    Ok(builder.build()?)
}

struct Backbone {
    storage: Arc<dyn Storage>,
    events: specf_events::EventSink,
    root: Utf8PathBuf,
}

fn backbone() -> Backbone {
    let root = workspace_root();
    let storage: Arc<dyn Storage> = Arc::new(LocalFsStorage::new(root.clone()));
    let (events, _handle) = spawn_event_writer(root.join("_runtime").join("events.jsonl"));
    Backbone { storage, events, root }
}

async fn load_job(storage: &dyn Storage, job_key: &str) -> anyhow::Result<ProductJob> {
    let content = storage.read(job_key).await?.ok_or_else(|| anyhow::anyhow!("no job found at key '{job_key}'"))?;
    Ok(serde_json::from_str(&content)?)
}

async fn cmd_run(config: &Config, job_key: &str) -> anyhow::Result<ExitCode> {
    let bb = backbone();
    let job = load_job(bb.storage.as_ref(), job_key).await?;

    let fixture_store = FixtureStore::new(Arc::clone(&bb.storage));
    let pages = fixture_store.load(&job.category, job.product_id.as_str()).await?;
    let mut fetcher = FixtureFetcher::new();
    for (url, page) in pages {
        fetcher = fetcher.with_page(url, page);
    }

    let rules = Arc::new(FieldRulesEngine::built_in());
    let aliases = Arc::new(EnumAliasTable::default());
    let fast = Arc::new(specf_llm::MockLlmClient::canned("fast", &[]));
    let reasoning = Arc::new(specf_llm::MockLlmClient::canned("reasoning", &[]));
    let llm = Arc::new(specf_llm::LlmExtractor::new(fast, reasoning, config.llm));

    let ctx = RunContext {
        storage: Arc::clone(&bb.storage),
        events: bb.events.clone(),
        rate_limiter: Arc::new(PerHostRateLimiter::new(config.per_host_min_delay_ms)),
        fetcher: Arc::new(fetcher),
        rules,
        aliases,
        llm,
        lock_root: bb.root.clone(),
        output_prefix: "specs/outputs".to_string(),
        config: config.clone(),
    };

    let run_id = format!("run-{}", chrono::Utc::now().timestamp());
    let record = specf_orchestrator::run_product(&ctx, &job, &run_id).await?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(ExitCode::SUCCESS)
}

async fn cmd_test_mode(config: &Config, action: TestModeAction) -> anyhow::Result<ExitCode> {
    let bb = backbone();
    match action {
        TestModeAction::Create { category, brand, model, variant, seed_urls } => {
            let catalog = CatalogStore::new(Arc::clone(&bb.storage), bb.events.clone(), bb.root.clone(), "specs/outputs");
            let outcome = catalog.add_product(&category, &brand, &model, &variant, seed_urls).await?;
            let job_key = specf_catalog::keys::product_job_key(&category, &outcome.product_id);
            println!("created {job_key}");
            Ok(ExitCode::SUCCESS)
        }
        TestModeAction::Generate { input } => {
            let job = load_job(bb.storage.as_ref(), &input).await?;
            let fixture_store = FixtureStore::new(Arc::clone(&bb.storage));
            let pages = generate_fixtures(&job);
            fixture_store.save(&job.category, job.product_id.as_str(), &pages).await?;
            println!("generated {} fixture page(s) for {}", pages.len(), job.product_id);
            Ok(ExitCode::SUCCESS)
        }
        TestModeAction::Run { input } => cmd_run(config, &input).await,
        TestModeAction::Validate { input } => {
            let job = load_job(bb.storage.as_ref(), &input).await?;
            let fixture_store = FixtureStore::new(Arc::clone(&bb.storage));
            let pages = fixture_store.load(&job.category, job.product_id.as_str()).await?;
            let missing = validate_fixtures(&job, &pages);
            if missing.is_empty() {
                println!("ok: every seed url has a fixture");
                Ok(ExitCode::SUCCESS)
            } else {
                for url in &missing {
                    println!("missing fixture for {url}");
                }
                Ok(ExitCode::CLI_ARGS)
            }
        }
        TestModeAction::Wipe { category } => {
            let fixture_store = FixtureStore::new(Arc::clone(&bb.storage));
            let removed = fixture_store.wipe_category(&category).await?;
            println!("removed {removed} fixture file(s) for category '{category}'");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn cmd_product_reconcile(config: &Config, category: &str, dry_run: bool) -> anyhow::Result<ExitCode> {
    let bb = backbone();
    let catalog = CatalogStore::new(Arc::clone(&bb.storage), bb.events.clone(), bb.root.clone(), "specs/outputs");
    let report = catalog.reconcile_orphans(category, dry_run).await?;
    let _ = config;

    if dry_run {
        println!("would delete {} orphan(s)", report.would_delete.len());
        for id in &report.would_delete {
            println!("  {id}");
        }
    } else {
        println!("deleted {} orphan(s)", report.deleted.len());
        for id in &report.deleted {
            println!("  {id}");
        }
    }
    for id in &report.warnings {
        println!("warning: fabricated variant with no canonical sibling: {id}");
    }
    Ok(ExitCode::SUCCESS)
}

/// Parse arguments, assemble config, and dispatch to the matching command.
pub async fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    specf_utils::logging::init_tracing(cli.verbose).map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::CLI_ARGS);
        }
    };

    let result = match cli.command {
        Command::Run { input } => cmd_run(&config, &input).await,
        Command::TestMode { action } => cmd_test_mode(&config, action).await,
        Command::ProductReconcile { category, dry_run } => cmd_product_reconcile(&config, &category, dry_run).await,
    };

    match result {
        Ok(code) => Ok(code),
        Err(e) => {
            if let Some(sf) = e.downcast_ref::<specf_utils::error::SpecFactoryError>() {
                eprintln!("{sf}");
                Ok(sf.to_exit_code())
            } else {
                eprintln!("{e}");
                Ok(ExitCode::INTERNAL)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_command() {
        let cli = Cli::parse_from(["spec-factory", "run", "--input", "specs/inputs/mouse/products/x.json"]);
        match cli.command {
            Command::Run { input } => assert_eq!(input, "specs/inputs/mouse/products/x.json"),
            _ => panic!("expected Run"),
        }
    }

    #[test]
    fn cli_parses_test_mode_create() {
        let cli = Cli::parse_from(["spec-factory", "test-mode", "create", "--category", "mouse", "--brand", "Razer", "--model", "X", "--seed-url", "https://a", "--seed-url", "https://b"]);
        match cli.command {
            Command::TestMode { action: TestModeAction::Create { seed_urls, .. } } => assert_eq!(seed_urls.len(), 2),
            _ => panic!("expected TestMode::Create"),
        }
    }

    #[test]
    fn cli_parses_product_reconcile_with_dry_run() {
        let cli = Cli::parse_from(["spec-factory", "product-reconcile", "--category", "mouse", "--dry-run"]);
        match cli.command {
            Command::ProductReconcile { category, dry_run } => {
                assert_eq!(category, "mouse");
                assert!(dry_run);
            }
            _ => panic!("expected ProductReconcile"),
        }
    }

    #[test]
    fn unknown_run_profile_is_rejected_before_any_io() {
        let cli = Cli::parse_from(["spec-factory", "--run-profile", "ludicrous", "run", "--input", "x"]);
        assert!(build_config(&cli).is_err());
    }
}
