//! `OrchestratorLoop`: the sequential per-product pipeline —
//! pop a planned URL, fetch it, run the deterministic→component→LLM
//! extraction cascade, audit and merge candidates, update the planner, and
//! repeat until the queue drains or the run deadline passes — plus the
//! daemon-level fan-out that runs many products concurrently over the
//! shared rate limiter and LLM cache.

pub mod evidence;
pub mod fetch;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::Utc;
use specf_catalog::keys;
use specf_config::Config;
use specf_events::EventSink;
use specf_planner::SourcePlanner;
use specf_ratelimit::RateLimiter;
use specf_rules::enum_alias::EnumAliasTable;
use specf_rules::field_rule::RequiredLevel;
use specf_rules::FieldRulesEngine;
use specf_storage::Storage;
use specf_utils::error::SpecFactoryError;
use specf_utils::types::{Candidate, EventKind, EventLevel, ExtraFields, NormalizedRecord, ProductJob, TrafficLight, UNKNOWN_VALUE};
use tracing::{info, warn};

use crate::fetch::SourceFetcher;

/// Everything `run_product`/`run_daemon` need, constructed once at process
/// start and shared across every concurrently-running product.
pub struct RunContext {
    pub storage: Arc<dyn Storage>,
    pub events: EventSink,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub rules: Arc<FieldRulesEngine>,
    pub aliases: Arc<EnumAliasTable>,
    pub llm: Arc<specf_llm::LlmExtractor>,
    pub lock_root: Utf8PathBuf,
    pub output_prefix: String,
    pub config: Config,
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase))
}

fn identity_tokens(job: &ProductJob) -> Vec<String> {
    let mut tokens: Vec<String> = specf_utils::slug::slugify(&job.identity_lock.brand).split('-').map(str::to_string).collect();
    tokens.extend(specf_utils::slug::slugify(&job.identity_lock.model).split('-').map(str::to_string));
    tokens.retain(|t| !t.is_empty());
    tokens
}

fn required_field_tokens(engine: &FieldRulesEngine) -> Vec<String> {
    engine
        .all_rules()
        .filter(|r| matches!(r.required_level, Some(RequiredLevel::Critical) | Some(RequiredLevel::Identity)))
        .flat_map(|r| r.anchors().into_iter().map(str::to_lowercase))
        .collect()
}

fn anchors_for_field(engine: &FieldRulesEngine, field: &str) -> Vec<String> {
    engine.rule(field).map(|r| r.anchors().into_iter().map(str::to_lowercase).collect()).unwrap_or_default()
}

async fn build_planner(ctx: &RunContext, job: &ProductJob, run_id: &str) -> SourcePlanner {
    let manufacturer_hosts: std::collections::HashSet<String> = job.seed_urls.iter().filter_map(|u| host_of(u)).collect();
    let approved_hosts: std::collections::HashSet<String> = job.preferred_sources.iter().filter_map(|u| host_of(u).or_else(|| Some(u.to_lowercase()))).collect();

    let mut planner = SourcePlanner::new(job.product_id.as_str(), run_id, ctx.config.planner.clone(), manufacturer_hosts, approved_hosts, identity_tokens(job), ctx.events.clone());
    planner.set_required_field_tokens(required_field_tokens(&ctx.rules));

    for url in &job.seed_urls {
        planner.enqueue(url, None).await;
    }
    planner
}

/// Re-merge the accumulated candidates and report which fields now meet
/// the pass target, so the planner can stop prioritizing their anchors.
fn recompute_filled_tokens(engine: &FieldRulesEngine, candidates: &[Candidate], preferred_hosts: &[String]) -> (BTreeMap<String, specf_utils::types::Provenance>, Vec<String>) {
    let provenance = specf_merger::merge(engine, candidates, preferred_hosts);
    let filled_tokens = provenance.iter().filter(|(_, p)| p.meets_pass_target).flat_map(|(field, _)| anchors_for_field(engine, field)).collect();
    (provenance, filled_tokens)
}

fn traffic_light_for(provenance: &specf_utils::types::Provenance) -> TrafficLight {
    TrafficLight::from_confidence(provenance.confidence, provenance.value == UNKNOWN_VALUE)
}

fn assemble_record(job: &ProductJob, run_id: &str, provenance: BTreeMap<String, specf_utils::types::Provenance>, extra_flags: Vec<String>) -> NormalizedRecord {
    let mut fields = BTreeMap::new();
    let mut traffic_lights = BTreeMap::new();
    let mut flags = extra_flags;

    for (field, prov) in &provenance {
        fields.insert(field.clone(), prov.value.clone());
        traffic_lights.insert(field.clone(), traffic_light_for(prov));
        for f in &prov.flags {
            flags.push(format!("{field}:{f}"));
        }
    }

    NormalizedRecord { product_id: job.product_id.clone(), identity: job.identity_lock.clone(), fields, provenance, traffic_lights, flags, run_id: run_id.to_string() }
}

async fn write_artifacts(ctx: &RunContext, job: &ProductJob, run_id: &str, record: &NormalizedRecord) -> Result<(), SpecFactoryError> {
    let json = serde_json::to_string_pretty(record)?;
    let runs_key = format!("{}/{run_id}/normalized.json", keys::runs_prefix(&ctx.output_prefix, &job.category, job.product_id.as_str()));
    let latest_key = format!("{}/normalized.json", keys::latest_prefix(&ctx.output_prefix, &job.category, job.product_id.as_str()));
    ctx.storage.write(&runs_key, &json).await?;
    ctx.storage.write(&latest_key, &json).await?;
    Ok(())
}

/// Run the sequential per-product pipeline to completion or until
/// `config.max_run_seconds` elapses, then write the normalized record to
/// `runs/{run_id}/` and mirror it to `latest/`.
pub async fn run_product(ctx: &RunContext, job: &ProductJob, run_id: &str) -> Result<NormalizedRecord, SpecFactoryError> {
    let _product_lock = specf_lock::acquire_product_lock(&ctx.lock_root, job.product_id.as_str()).map_err(|e| SpecFactoryError::Lock(e.to_string()))?;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(ctx.config.max_run_seconds);
    let aggressive_started = tokio::time::Instant::now();

    ctx.events.emit_simple(EventLevel::Info, EventKind::RunStarted, Some(job.product_id.as_str().to_string()), Some(run_id.to_string()), ExtraFields::new()).await;

    let mut planner = build_planner(ctx, job, run_id).await;
    let mut full_pack = specf_utils::types::EvidencePack::default();
    let mut all_candidates: Vec<Candidate> = Vec::new();
    let mut all_demoted: Vec<specf_audit::DemotedCandidate> = Vec::new();
    let mut source_seq = 0usize;
    let mut cancelled = false;

    ctx.llm.start_product();

    while !planner.is_empty() {
        if tokio::time::Instant::now() >= deadline {
            cancelled = true;
            break;
        }
        let Some(queued) = planner.pop_next() else { break };

        ctx.rate_limiter.wait_for_host(&queued.host).await;

        let page = match ctx.fetcher.fetch(&queued.url).await {
            Ok(p) => p,
            Err(e) => {
                warn!(url = %queued.url, error = %specf_error_redaction::redact_error_message_for_logging(&e.to_string()), "source fetch failed");
                continue;
            }
        };

        source_seq += 1;
        evidence::append_page(&mut full_pack, &queued.url, &queued.host, &page, source_seq);

        let mut deterministic = specf_parser::parse(&ctx.rules, &full_pack);
        let inferred = specf_components::resolve(&ctx.rules, &deterministic);
        deterministic.extend(inferred);

        let (_, still_unfilled) = recompute_filled_tokens(&ctx.rules, &all_candidates, &job.preferred_sources);
        let unfilled_fields: Vec<String> = ctx.rules.all_rules().map(|r| r.field.clone()).filter(|f| !all_candidates.iter().any(|c| c.field == *f)).collect();
        let _ = still_unfilled;

        ctx.llm.start_round();
        let llm_candidates = ctx.llm.extract(&ctx.rules, &full_pack, &unfilled_fields).await;

        let auditor = specf_audit::EvidenceAuditor::new(&ctx.rules, &ctx.aliases);
        let batch = auditor.audit_batch(&full_pack, deterministic.into_iter().chain(llm_candidates).collect());
        all_candidates.extend(batch.passed);
        all_demoted.extend(batch.demoted);

        let (_, newly_filled_tokens) = recompute_filled_tokens(&ctx.rules, &all_candidates, &job.preferred_sources);
        planner.mark_fields_filled(&newly_filled_tokens);

        let mut kv = ExtraFields::new();
        kv.insert("url".to_string(), serde_json::json!(queued.url));
        ctx.events.emit_simple(EventLevel::Debug, EventKind::SourceProcessed, Some(job.product_id.as_str().to_string()), Some(run_id.to_string()), kv).await;
    }

    let (mut provenance, _) = recompute_filled_tokens(&ctx.rules, &all_candidates, &job.preferred_sources);
    specf_audit::apply_demotions(&mut provenance, &all_demoted);

    if ctx.config.aggressive.aggressive_mode_enabled {
        run_aggressive_pass(ctx, job, run_id, &full_pack, &mut all_candidates, &mut all_demoted, &mut provenance, aggressive_started).await;
    }

    let mut flags = Vec::new();
    if cancelled {
        flags.push("run_deadline_exceeded".to_string());
    }
    let record = assemble_record(job, run_id, provenance, flags);
    write_artifacts(ctx, job, run_id, &record).await?;

    let kind = if cancelled { EventKind::RunCancelled } else { EventKind::RunCompleted };
    let level = if cancelled { EventLevel::Warn } else { EventLevel::Info };
    ctx.events.emit_simple(level, kind, Some(job.product_id.as_str().to_string()), Some(run_id.to_string()), ExtraFields::new()).await;

    Ok(record)
}

/// Optional second pass: spend extra reasoning-LLM calls on
/// fields still critical-and-unknown, bounded by its own wall-clock budget
/// rather than the run's overall deadline.
async fn run_aggressive_pass(
    ctx: &RunContext,
    job: &ProductJob,
    run_id: &str,
    pack: &specf_utils::types::EvidencePack,
    all_candidates: &mut Vec<Candidate>,
    all_demoted: &mut Vec<specf_audit::DemotedCandidate>,
    provenance: &mut BTreeMap<String, specf_utils::types::Provenance>,
    started: tokio::time::Instant,
) {
    let aggressive_deadline = started + Duration::from_millis(ctx.config.aggressive.aggressive_max_time_per_product_ms);
    if tokio::time::Instant::now() >= aggressive_deadline {
        return;
    }

    let critical_unknown: Vec<String> = ctx
        .rules
        .all_rules()
        .filter(|r| matches!(r.required_level, Some(RequiredLevel::Critical)))
        .map(|r| r.field.clone())
        .filter(|f| provenance.get(f).is_none_or(|p| p.value == UNKNOWN_VALUE))
        .collect();

    if critical_unknown.is_empty() {
        return;
    }

    info!(product_id = job.product_id.as_str(), count = critical_unknown.len(), "aggressive pass: reasoning over critical gaps");
    ctx.llm.start_round();
    let llm_candidates = ctx.llm.extract(&ctx.rules, pack, &critical_unknown).await;

    let auditor = specf_audit::EvidenceAuditor::new(&ctx.rules, &ctx.aliases);
    let audit_enabled = ctx.config.aggressive.aggressive_evidence_audit_enabled;
    let (passed, demoted) = if audit_enabled {
        let batch = auditor.audit_batch(pack, llm_candidates);
        (batch.passed, batch.demoted)
    } else {
        (llm_candidates, Vec::new())
    };

    all_candidates.extend(passed);
    all_demoted.extend(demoted);

    let (new_provenance, _) = recompute_filled_tokens(&ctx.rules, all_candidates, &job.preferred_sources);
    *provenance = new_provenance;
    specf_audit::apply_demotions(provenance, all_demoted);

    let mut kv = ExtraFields::new();
    kv.insert("fields".to_string(), serde_json::json!(critical_unknown));
    let _ = run_id;
    ctx.events.emit_simple(EventLevel::Debug, EventKind::LlmBatchCompleted, Some(job.product_id.as_str().to_string()), Some(run_id.to_string()), kv).await;
}

/// Run `jobs` concurrently, up to `concurrency` at a time, sharing one
/// `RunContext` (and therefore one rate limiter and LLM cache) across every
/// task.
pub async fn run_daemon(ctx: Arc<RunContext>, jobs: Vec<ProductJob>, concurrency: usize) -> Vec<Result<NormalizedRecord, SpecFactoryError>> {
    let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency.max(1)));
    let mut set = tokio::task::JoinSet::new();
    let batch_started = Utc::now().timestamp();

    for (idx, job) in jobs.into_iter().enumerate() {
        let ctx = Arc::clone(&ctx);
        let sem = Arc::clone(&semaphore);
        let run_id = format!("run-{batch_started}-{idx}");
        set.spawn(async move {
            let _permit = sem.acquire_owned().await.expect("semaphore is never closed");
            run_product(&ctx, &job, &run_id).await
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(join_err) => results.push(Err(SpecFactoryError::Io(std::io::Error::other(join_err.to_string())))),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchedPage, FixtureFetcher};
    use specf_config::RunProfile;
    use specf_events::spawn_event_writer;
    use specf_ratelimit::PerHostRateLimiter;
    use specf_storage::LocalFsStorage;
    use specf_utils::paths::with_isolated_home;
    use specf_utils::slug::{build_product_id, normalize_identity};
    use specf_utils::types::{IdentityLock, SourceRole, Tier};

    fn job() -> ProductJob {
        let identity = normalize_identity("mouse", "Razer", "DeathAdder V3", "");
        let product_id = build_product_id(&identity);
        ProductJob {
            product_id,
            category: "mouse".to_string(),
            identity_lock: IdentityLock { id: Some(1), identifier: None, brand: "Razer".to_string(), model: "DeathAdder V3".to_string(), variant: String::new(), sku: None, mpn: None, gtin: None, extra: Default::default() },
            seed_urls: vec!["https://razer.com/products/deathadder-v3".to_string()],
            preferred_sources: vec![],
            anchors: Default::default(),
        }
    }

    async fn context(fetcher: FixtureFetcher) -> (specf_utils::paths::HomeGuard, RunContext) {
        let guard = with_isolated_home();
        let root = specf_utils::paths::workspace_root();
        let storage: Arc<dyn Storage> = Arc::new(LocalFsStorage::new(root.clone()));
        let (events, _handle) = spawn_event_writer(root.join("_runtime").join("events.jsonl"));
        let rules = Arc::new(FieldRulesEngine::built_in());
        let aliases = Arc::new(EnumAliasTable::default());
        let fast = Arc::new(specf_llm::MockLlmClient::canned("fast", &[]));
        let reasoning = Arc::new(specf_llm::MockLlmClient::canned("reasoning", &[]));
        let mut config = RunProfile::Fast.defaults();
        config.max_run_seconds = 5;
        let llm = Arc::new(specf_llm::LlmExtractor::new(fast, reasoning, config.llm.clone()));
        let ctx = RunContext {
            storage,
            events,
            rate_limiter: Arc::new(PerHostRateLimiter::new(0)),
            fetcher: Arc::new(fetcher),
            rules,
            aliases,
            llm,
            lock_root: root.clone(),
            output_prefix: "specs/outputs".to_string(),
            config,
        };
        (guard, ctx)
    }

    #[tokio::test]
    async fn s3_end_to_end_spec_table_source_fills_sensor_and_infers_dpi() {
        let fetcher = FixtureFetcher::new().with_page(
            "https://razer.com/products/deathadder-v3",
            FetchedPage { body: "sensor: PixArt PAW3950 | polling rate: 8000Hz".to_string(), tier: Tier(1), role: SourceRole::Manufacturer },
        );
        let (_guard, ctx) = context(fetcher).await;
        let job = job();

        let record = run_product(&ctx, &job, "run-test-1").await.unwrap();

        assert_eq!(record.fields["sensor"], "PixArt PAW3950");
        assert_eq!(record.fields["dpi"], "30000");
        assert_eq!(record.traffic_lights["sensor"], TrafficLight::Green);
    }

    #[tokio::test]
    async fn no_fetchable_sources_leaves_fields_unknown() {
        let fetcher = FixtureFetcher::new();
        let (_guard, ctx) = context(fetcher).await;
        let job = job();

        let record = run_product(&ctx, &job, "run-test-2").await.unwrap();
        assert_eq!(record.fields["weight"], UNKNOWN_VALUE);
    }

    #[tokio::test]
    async fn artifacts_are_mirrored_to_latest_and_runs() {
        let fetcher = FixtureFetcher::new().with_page(
            "https://razer.com/products/deathadder-v3",
            FetchedPage { body: "Weight: 54 g".to_string(), tier: Tier(1), role: SourceRole::Manufacturer },
        );
        let (_guard, ctx) = context(fetcher).await;
        let job = job();

        run_product(&ctx, &job, "run-test-3").await.unwrap();

        let latest = ctx.storage.read(&format!("{}/normalized.json", keys::latest_prefix(&ctx.output_prefix, &job.category, job.product_id.as_str()))).await.unwrap();
        assert!(latest.is_some());
        let runs = ctx.storage.read(&format!("{}/run-test-3/normalized.json", keys::runs_prefix(&ctx.output_prefix, &job.category, job.product_id.as_str()))).await.unwrap();
        assert!(runs.is_some());
    }

    #[tokio::test]
    async fn daemon_runs_multiple_products_concurrently() {
        let fetcher = FixtureFetcher::new().with_page(
            "https://razer.com/products/deathadder-v3",
            FetchedPage { body: "Weight: 54 g".to_string(), tier: Tier(1), role: SourceRole::Manufacturer },
        );
        let (_guard, ctx) = context(fetcher).await;
        let mut second = job();
        second.product_id = specf_utils::types::ProductId::from_parts(&specf_utils::slug::Slug::new("mouse"), &specf_utils::slug::Slug::new("acme"), &specf_utils::slug::Slug::new("x1"), None);
        second.seed_urls = vec![];

        let results = run_daemon(Arc::new(ctx), vec![job(), second], 2).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(std::result::Result::is_ok));
    }
}
