//! `SourcePlanner`: the per-product discovery queue. URLs are
//! enqueued into one of three lanes keyed by how much the host is trusted
//! (manufacturer / approved / candidate), each gated by its own per-host
//! and per-product budgets from [`specf_config::PlannerBudgets`], then
//! drained in priority order by the orchestrator's fetch loop.
//!
//! Discovery hooks (`discover_from_html`, `discover_from_sitemap`,
//! `discover_from_robots`) pull more URLs out of fetched page content and
//! feed them back through the same `enqueue` gate, so a candidate-tier page
//! can never smuggle in an unbounded crawl.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use specf_config::PlannerBudgets;
use specf_events::EventSink;
use specf_utils::types::{EventKind, EventLevel, SourceRole, Tier};

/// Which queue an enqueued URL landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Manufacturer,
    Approved,
    Candidate,
}

/// Why an enqueue attempt never reached a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    InvalidUrl,
    HostBlocked,
    AlreadyVisited,
    AlreadyQueued,
    TotalUrlBudgetExhausted,
    ManufacturerUrlBudgetExhausted,
    ManufacturerPagesPerDomainExhausted,
    ApprovedPagesPerDomainExhausted,
    CandidateUrlBudgetExhausted,
    NotRelevant,
}

impl RejectionReason {
    fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::HostBlocked => "host_blocked",
            Self::AlreadyVisited => "already_visited",
            Self::AlreadyQueued => "already_queued",
            Self::TotalUrlBudgetExhausted => "total_url_budget_exhausted",
            Self::ManufacturerUrlBudgetExhausted => "manufacturer_url_budget_exhausted",
            Self::ManufacturerPagesPerDomainExhausted => "manufacturer_pages_per_domain_exhausted",
            Self::ApprovedPagesPerDomainExhausted => "approved_pages_per_domain_exhausted",
            Self::CandidateUrlBudgetExhausted => "candidate_url_budget_exhausted",
            Self::NotRelevant => "not_relevant",
        }
    }
}

/// One URL sitting in a planner lane, ready to be popped and fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedUrl {
    pub url: String,
    pub host: String,
    pub lane: Lane,
    pub tier: Tier,
    pub role: SourceRole,
    pub priority: f64,
    pub discovered_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    Accepted(QueuedUrl),
    Rejected { url: String, reason: RejectionReason },
}

fn path_segment_count(url: &Url) -> usize {
    url.path_segments().map(|s| s.filter(|seg| !seg.is_empty()).count()).unwrap_or(0)
}

/// Base priority plus boosts/penalties from the required-field gap and a
/// handful of path heuristics common to product-spec pages.
fn score_url(url: &Url, unfilled_tokens: &HashSet<String>, identity_tokens: &[String]) -> f64 {
    const BASE: f64 = 0.30;
    const REQUIRED_FIELD_BOOST_CAP: f64 = 0.20;
    const REQUIRED_FIELD_BOOST_PER_TOKEN: f64 = 0.05;
    const IDENTITY_BOOST: f64 = 0.15;
    const PATH_KEYWORD_BOOST: f64 = 0.10;
    const PATH_KEYWORD_PENALTY: f64 = 0.15;

    let haystack = format!("{} {}", url.path().to_lowercase(), url.query().unwrap_or("").to_lowercase());

    let mut score = BASE;

    let matched_required = unfilled_tokens.iter().filter(|t| !t.is_empty() && haystack.contains(t.as_str())).count();
    score += (REQUIRED_FIELD_BOOST_PER_TOKEN * matched_required as f64).min(REQUIRED_FIELD_BOOST_CAP);

    if identity_tokens.iter().any(|t| !t.is_empty() && haystack.contains(t.as_str())) {
        score += IDENTITY_BOOST;
    }

    for kw in ["spec", "specs", "specifications", "datasheet", "support", "manual", "product"] {
        if haystack.contains(kw) {
            score += PATH_KEYWORD_BOOST;
            break;
        }
    }
    for kw in ["cart", "login", "account", "checkout", "blog", "news", "privacy", "terms", "careers"] {
        if haystack.contains(kw) {
            score -= PATH_KEYWORD_PENALTY;
            break;
        }
    }

    score.clamp(0.0, 1.0)
}

/// Insert `item` into `lane`, keeping it sorted by the lane's ordering rule.
fn sorted_insert(lane: &mut Vec<QueuedUrl>, item: QueuedUrl, path_depth: usize) {
    let idx = match item.lane {
        // Manufacturer pages: deeper (more specific) paths first, since a
        // homepage is enqueued but a product page should be fetched first.
        Lane::Manufacturer => lane.partition_point(|existing| {
            let existing_depth = Url::parse(&existing.url).map(|u| path_segment_count(&u)).unwrap_or(0);
            existing_depth > path_depth || (existing_depth == path_depth && existing.url < item.url)
        }),
        // Everything else: highest score first, tier as tiebreaker, then URL.
        Lane::Approved | Lane::Candidate => lane.partition_point(|existing| {
            existing.priority > item.priority || (existing.priority == item.priority && existing.tier < item.tier) || (existing.priority == item.priority && existing.tier == item.tier && existing.url < item.url)
        }),
    };
    lane.insert(idx, item);
}

fn normalize_key(url: &Url) -> String {
    format!("{}://{}{}{}", url.scheme(), url.host_str().unwrap_or(""), url.path(), url.query().map(|q| format!("?{q}")).unwrap_or_default())
}

static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"'#]+)["']"#).unwrap());
static SITEMAP_LOC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<loc>\s*([^<\s]+)\s*</loc>").unwrap());
static ROBOTS_SITEMAP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?im)^\s*sitemap:\s*(\S+)").unwrap());

/// The per-product planning state: lanes, budgets consumed so far, and the
/// host allow/deny lists that decide which lane a URL lands in.
pub struct SourcePlanner {
    product_id: String,
    run_id: String,
    budgets: PlannerBudgets,
    events: EventSink,

    manufacturer_hosts: HashSet<String>,
    approved_hosts: HashSet<String>,
    denied_hosts: HashSet<String>,
    identity_tokens: Vec<String>,
    unfilled_required_tokens: HashSet<String>,

    visited: HashSet<String>,
    queued_keys: HashSet<String>,

    manufacturer_lane: Vec<QueuedUrl>,
    approved_lane: Vec<QueuedUrl>,
    candidate_lane: Vec<QueuedUrl>,

    total_accepted: u32,
    manufacturer_urls_for_product: u32,
    candidate_urls_used: u32,
    manufacturer_pages_per_domain: HashMap<String, u32>,
    approved_pages_per_domain: HashMap<String, u32>,
}

impl SourcePlanner {
    #[must_use]
    pub fn new(
        product_id: impl Into<String>,
        run_id: impl Into<String>,
        budgets: PlannerBudgets,
        manufacturer_hosts: HashSet<String>,
        approved_hosts: HashSet<String>,
        identity_tokens: Vec<String>,
        events: EventSink,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            run_id: run_id.into(),
            budgets,
            events,
            manufacturer_hosts: manufacturer_hosts.into_iter().map(|h| h.to_lowercase()).collect(),
            approved_hosts: approved_hosts.into_iter().map(|h| h.to_lowercase()).collect(),
            denied_hosts: HashSet::new(),
            identity_tokens: identity_tokens.into_iter().map(|t| t.to_lowercase()).collect(),
            unfilled_required_tokens: HashSet::new(),
            visited: HashSet::new(),
            queued_keys: HashSet::new(),
            manufacturer_lane: Vec::new(),
            approved_lane: Vec::new(),
            candidate_lane: Vec::new(),
            total_accepted: 0,
            manufacturer_urls_for_product: 0,
            candidate_urls_used: 0,
            manufacturer_pages_per_domain: HashMap::new(),
            approved_pages_per_domain: HashMap::new(),
        }
    }

    /// Seed the anchor tokens used for the required-field priority boost
    /// and re-scoring after `mark_fields_filled`.
    pub fn set_required_field_tokens(&mut self, tokens: impl IntoIterator<Item = String>) {
        self.unfilled_required_tokens = tokens.into_iter().map(|t| t.to_lowercase()).collect();
    }

    fn is_relevant(&self, url: &Url) -> bool {
        if self.identity_tokens.is_empty() {
            return true;
        }
        let haystack = format!("{} {}", url.host_str().unwrap_or("").to_lowercase(), url.path().to_lowercase());
        self.identity_tokens.iter().any(|t| !t.is_empty() && haystack.contains(t.as_str()))
    }

    async fn emit_rejected(&self, url: &str, reason: RejectionReason) {
        let mut kv = specf_utils::types::ExtraFields::new();
        kv.insert("url".to_string(), serde_json::json!(url));
        kv.insert("reason".to_string(), serde_json::json!(reason.as_str()));
        self.events.emit_simple(EventLevel::Debug, EventKind::PlannerRejected, Some(self.product_id.clone()), Some(self.run_id.clone()), kv).await;
    }

    async fn emit_enqueued(&self, item: &QueuedUrl) {
        let mut kv = specf_utils::types::ExtraFields::new();
        kv.insert("url".to_string(), serde_json::json!(item.url));
        kv.insert("lane".to_string(), serde_json::json!(format!("{:?}", item.lane)));
        kv.insert("priority".to_string(), serde_json::json!(item.priority));
        self.events.emit_simple(EventLevel::Debug, EventKind::PlannerEnqueued, Some(self.product_id.clone()), Some(self.run_id.clone()), kv).await;
    }

    /// Attempt to enqueue one discovered URL. Never panics on malformed
    /// input; every rejection path returns a typed reason instead of an
    /// error, since a planner fed garbage by page discovery is an expected
    /// operating condition, not a bug.
    pub async fn enqueue(&mut self, raw_url: &str, discovered_from: Option<&str>) -> EnqueueOutcome {
        let reject = |reason: RejectionReason| EnqueueOutcome::Rejected { url: raw_url.to_string(), reason };

        let Ok(parsed) = Url::parse(raw_url) else {
            self.emit_rejected(raw_url, RejectionReason::InvalidUrl).await;
            return reject(RejectionReason::InvalidUrl);
        };
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            self.emit_rejected(raw_url, RejectionReason::InvalidUrl).await;
            return reject(RejectionReason::InvalidUrl);
        }
        let Some(host) = parsed.host_str().map(str::to_lowercase) else {
            self.emit_rejected(raw_url, RejectionReason::InvalidUrl).await;
            return reject(RejectionReason::InvalidUrl);
        };

        if self.denied_hosts.contains(&host) {
            self.emit_rejected(raw_url, RejectionReason::HostBlocked).await;
            return reject(RejectionReason::HostBlocked);
        }

        let key = normalize_key(&parsed);
        if self.visited.contains(&key) {
            return reject(RejectionReason::AlreadyVisited);
        }
        if !self.queued_keys.insert(key.clone()) {
            return reject(RejectionReason::AlreadyQueued);
        }

        let lane = if self.manufacturer_hosts.contains(&host) {
            Lane::Manufacturer
        } else if self.approved_hosts.contains(&host) {
            Lane::Approved
        } else {
            Lane::Candidate
        };

        let reason = match lane {
            Lane::Manufacturer => {
                if self.manufacturer_urls_for_product >= self.budgets.max_manufacturer_urls_per_product {
                    Some(RejectionReason::ManufacturerUrlBudgetExhausted)
                } else if *self.manufacturer_pages_per_domain.get(&host).unwrap_or(&0) >= self.budgets.max_manufacturer_pages_per_domain {
                    Some(RejectionReason::ManufacturerPagesPerDomainExhausted)
                } else {
                    None
                }
            }
            Lane::Approved => {
                if *self.approved_pages_per_domain.get(&host).unwrap_or(&0) >= self.budgets.max_pages_per_domain {
                    Some(RejectionReason::ApprovedPagesPerDomainExhausted)
                } else {
                    None
                }
            }
            Lane::Candidate => {
                if !self.is_relevant(&parsed) {
                    Some(RejectionReason::NotRelevant)
                } else if self.candidate_urls_used >= self.budgets.max_candidate_urls {
                    Some(RejectionReason::CandidateUrlBudgetExhausted)
                } else {
                    None
                }
            }
        };

        if reason.is_none() && self.total_accepted >= self.budgets.max_urls_per_product {
            self.queued_keys.remove(&key);
            self.emit_rejected(raw_url, RejectionReason::TotalUrlBudgetExhausted).await;
            return reject(RejectionReason::TotalUrlBudgetExhausted);
        }
        if let Some(reason) = reason {
            self.queued_keys.remove(&key);
            self.emit_rejected(raw_url, reason).await;
            return reject(reason);
        }

        let (tier, role) = match lane {
            Lane::Manufacturer => (Tier(1), SourceRole::Manufacturer),
            Lane::Approved => (Tier(3), SourceRole::Retailer),
            Lane::Candidate => (Tier(5), SourceRole::Other),
        };
        let priority = score_url(&parsed, &self.unfilled_required_tokens, &self.identity_tokens);
        let depth = path_segment_count(&parsed);

        let item = QueuedUrl { url: raw_url.to_string(), host: host.clone(), lane, tier, role, priority, discovered_from: discovered_from.map(str::to_string) };

        self.total_accepted += 1;
        match lane {
            Lane::Manufacturer => {
                self.manufacturer_urls_for_product += 1;
                *self.manufacturer_pages_per_domain.entry(host).or_insert(0) += 1;
                sorted_insert(&mut self.manufacturer_lane, item.clone(), depth);
            }
            Lane::Approved => {
                *self.approved_pages_per_domain.entry(host).or_insert(0) += 1;
                sorted_insert(&mut self.approved_lane, item.clone(), depth);
            }
            Lane::Candidate => {
                self.candidate_urls_used += 1;
                sorted_insert(&mut self.candidate_lane, item.clone(), depth);
            }
        }

        self.emit_enqueued(&item).await;
        EnqueueOutcome::Accepted(item)
    }

    /// Pop the next URL to fetch: manufacturer lane drains first (subject
    /// to `manufacturerReserveUrls` worth of priority, already reflected in
    /// that lane's own budget), then approved, then candidate.
    pub fn pop_next(&mut self) -> Option<QueuedUrl> {
        let item = if !self.manufacturer_lane.is_empty() {
            self.manufacturer_lane.remove(0)
        } else if !self.approved_lane.is_empty() {
            self.approved_lane.remove(0)
        } else if !self.candidate_lane.is_empty() {
            self.candidate_lane.remove(0)
        } else {
            return None;
        };
        let key = normalize_key(&Url::parse(&item.url).expect("queued urls are always valid"));
        self.queued_keys.remove(&key);
        self.visited.insert(key);
        Some(item)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.manufacturer_lane.is_empty() && self.approved_lane.is_empty() && self.candidate_lane.is_empty()
    }

    /// Drop a field's anchor tokens from the required-field boost once it
    /// has a value, then re-sort the non-manufacturer lanes (whose order
    /// depends on score) against the shrunken token set.
    pub fn mark_fields_filled(&mut self, filled_tokens: &[String]) {
        for t in filled_tokens {
            self.unfilled_required_tokens.remove(&t.to_lowercase());
        }
        for lane in [&mut self.approved_lane, &mut self.candidate_lane] {
            for item in lane.iter_mut() {
                if let Ok(u) = Url::parse(&item.url) {
                    item.priority = score_url(&u, &self.unfilled_required_tokens, &self.identity_tokens);
                }
            }
            lane.sort_by(|a, b| b.priority.partial_cmp(&a.priority).unwrap_or(std::cmp::Ordering::Equal).then(a.tier.cmp(&b.tier)).then(a.url.cmp(&b.url)));
        }
    }

    /// Block a host outright: future enqueues are rejected and anything
    /// already queued for it is dropped.
    pub async fn block_host(&mut self, host: &str, reason: &str) {
        let host = host.to_lowercase();
        self.denied_hosts.insert(host.clone());
        for lane in [&mut self.manufacturer_lane, &mut self.approved_lane, &mut self.candidate_lane] {
            lane.retain(|item| item.host != host);
        }
        let mut kv = specf_utils::types::ExtraFields::new();
        kv.insert("host".to_string(), serde_json::json!(host));
        kv.insert("reason".to_string(), serde_json::json!(reason));
        self.events.emit_simple(EventLevel::Warn, EventKind::PlannerBlockedHost, Some(self.product_id.clone()), Some(self.run_id.clone()), kv).await;
    }

    /// Extract `href` targets from fetched HTML and enqueue each one,
    /// resolving relative links against `base_url`.
    pub async fn discover_from_html(&mut self, base_url: &str, html: &str) -> Vec<EnqueueOutcome> {
        let Ok(base) = Url::parse(base_url) else { return Vec::new() };
        let mut out = Vec::new();
        for cap in HREF_RE.captures_iter(html) {
            let Some(href) = cap.get(1) else { continue };
            let Ok(resolved) = base.join(href.as_str()) else { continue };
            out.push(self.enqueue(resolved.as_str(), Some(base_url)).await);
        }
        out
    }

    /// Extract `<loc>` entries from a sitemap document and enqueue each.
    pub async fn discover_from_sitemap(&mut self, sitemap_url: &str, xml: &str) -> Vec<EnqueueOutcome> {
        let mut out = Vec::new();
        for cap in SITEMAP_LOC_RE.captures_iter(xml) {
            let Some(loc) = cap.get(1) else { continue };
            out.push(self.enqueue(loc.as_str(), Some(sitemap_url)).await);
        }
        out
    }

    /// Extract `Sitemap:` directives from a robots.txt body. Returns the
    /// resolved sitemap URLs for the caller to fetch and hand to
    /// [`Self::discover_from_sitemap`]; robots.txt never names content
    /// pages directly, so nothing here is enqueued.
    #[must_use]
    pub fn discover_from_robots(&self, robots_url: &str, body: &str) -> Vec<String> {
        let base = Url::parse(robots_url).ok();
        ROBOTS_SITEMAP_RE
            .captures_iter(body)
            .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
            .filter_map(|raw| match Url::parse(raw) {
                Ok(u) => Some(u.to_string()),
                Err(_) => base.as_ref().and_then(|b| b.join(raw).ok()).map(|u| u.to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specf_events::spawn_event_writer;
    use specf_utils::paths::with_isolated_home;

    fn budgets() -> PlannerBudgets {
        PlannerBudgets {
            max_urls_per_product: 30,
            max_pages_per_domain: 4,
            max_manufacturer_urls_per_product: 10,
            max_manufacturer_pages_per_domain: 4,
            manufacturer_reserve_urls: 6,
            max_candidate_urls: 10,
        }
    }

    fn planner() -> (specf_utils::paths::HomeGuard, SourcePlanner) {
        let guard = with_isolated_home();
        let root = specf_utils::paths::workspace_root();
        let (events, _handle) = spawn_event_writer(root.join("_runtime").join("events.jsonl"));
        let mut hosts = HashSet::new();
        hosts.insert("razer.com".to_string());
        let planner = SourcePlanner::new("mouse-razer-deathadder-v3", "run-1", budgets(), hosts, HashSet::new(), vec!["deathadder".to_string(), "v3".to_string()], events);
        (guard, planner)
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let (_guard, mut p) = planner();
        let outcome = p.enqueue("not a url", None).await;
        assert!(matches!(outcome, EnqueueOutcome::Rejected { reason: RejectionReason::InvalidUrl, .. }));
    }

    #[tokio::test]
    async fn s5_manufacturer_lane_prefers_deeper_product_page_over_homepage() {
        let (_guard, mut p) = planner();
        p.enqueue("https://razer.com/", None).await;
        p.enqueue("https://razer.com/products/deathadder-v3", None).await;

        let first = p.pop_next().unwrap();
        assert_eq!(first.url, "https://razer.com/products/deathadder-v3");
        let second = p.pop_next().unwrap();
        assert_eq!(second.url, "https://razer.com/");
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_rejected() {
        let (_guard, mut p) = planner();
        p.enqueue("https://razer.com/products/deathadder-v3", None).await;
        let outcome = p.enqueue("https://razer.com/products/deathadder-v3", None).await;
        assert!(matches!(outcome, EnqueueOutcome::Rejected { reason: RejectionReason::AlreadyQueued, .. }));
    }

    #[tokio::test]
    async fn popped_url_cannot_be_requeued_as_visited() {
        let (_guard, mut p) = planner();
        p.enqueue("https://razer.com/products/deathadder-v3", None).await;
        p.pop_next();
        let outcome = p.enqueue("https://razer.com/products/deathadder-v3", None).await;
        assert!(matches!(outcome, EnqueueOutcome::Rejected { reason: RejectionReason::AlreadyVisited, .. }));
    }

    #[tokio::test]
    async fn manufacturer_pages_per_domain_budget_is_enforced() {
        let (_guard, mut p) = planner();
        p.budgets.max_manufacturer_pages_per_domain = 1;
        p.enqueue("https://razer.com/products/a", None).await;
        let outcome = p.enqueue("https://razer.com/products/b", None).await;
        assert!(matches!(outcome, EnqueueOutcome::Rejected { reason: RejectionReason::ManufacturerPagesPerDomainExhausted, .. }));
    }

    #[tokio::test]
    async fn candidate_lane_drops_irrelevant_urls() {
        let (_guard, mut p) = planner();
        let outcome = p.enqueue("https://randomblog.example/totally-unrelated-post", None).await;
        assert!(matches!(outcome, EnqueueOutcome::Rejected { reason: RejectionReason::NotRelevant, .. }));
    }

    #[tokio::test]
    async fn candidate_lane_accepts_relevant_urls() {
        let (_guard, mut p) = planner();
        let outcome = p.enqueue("https://reviewsite.example/razer-deathadder-v3-review", None).await;
        assert!(matches!(outcome, EnqueueOutcome::Accepted(QueuedUrl { lane: Lane::Candidate, .. })));
    }

    #[tokio::test]
    async fn blocked_host_rejects_future_enqueues_and_drops_queued() {
        let (_guard, mut p) = planner();
        p.enqueue("https://razer.com/products/deathadder-v3", None).await;
        p.block_host("razer.com", "robots_disallow").await;
        assert!(p.is_empty());
        let outcome = p.enqueue("https://razer.com/products/other", None).await;
        assert!(matches!(outcome, EnqueueOutcome::Rejected { reason: RejectionReason::HostBlocked, .. }));
    }

    #[tokio::test]
    async fn discover_from_html_resolves_relative_links() {
        let (_guard, mut p) = planner();
        let html = r#"<a href="/products/deathadder-v3">buy</a><a href="https://razer.com/support">support</a>"#;
        let outcomes = p.discover_from_html("https://razer.com/", html).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| matches!(o, EnqueueOutcome::Accepted(_))));
    }

    #[tokio::test]
    async fn discover_from_sitemap_extracts_loc_entries() {
        let (_guard, mut p) = planner();
        let xml = "<urlset><url><loc>https://razer.com/products/deathadder-v3</loc></url></urlset>";
        let outcomes = p.discover_from_sitemap("https://razer.com/sitemap.xml", xml).await;
        assert_eq!(outcomes.len(), 1);
    }

    #[test]
    fn discover_from_robots_extracts_sitemap_urls() {
        let (_guard, p) = planner();
        let body = "User-agent: *\nDisallow: /cart\nSitemap: https://razer.com/sitemap.xml\n";
        let sitemaps = p.discover_from_robots("https://razer.com/robots.txt", body);
        assert_eq!(sitemaps, vec!["https://razer.com/sitemap.xml".to_string()]);
    }

    #[test]
    fn mark_fields_filled_shrinks_required_token_set() {
        let (_guard, mut p) = planner();
        p.set_required_field_tokens(["sensor".to_string(), "weight".to_string()]);
        assert!(p.unfilled_required_tokens.contains("sensor"));
        p.mark_fields_filled(&["sensor".to_string()]);
        assert!(!p.unfilled_required_tokens.contains("sensor"));
        assert!(p.unfilled_required_tokens.contains("weight"));
    }
}
