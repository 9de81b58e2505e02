//! Turn one fetched page into the `Snippet`/`Source` pair the deterministic
//! parser and LLM extractor both operate on. The shape heuristics mirror
//! what `specf-parser`'s strategies expect: a JSON body becomes one
//! `JsonLdProduct` snippet, `key: value` rows separated by newlines or `|`
//! become `SpecTableRow`, anything else is `Prose`.

use specf_utils::types::{EvidencePack, ExtractionMethodSurface, Snippet, SnippetType, Source, SourceRole, Tier};

use crate::fetch::FetchedPage;

fn classify(body: &str) -> (SnippetType, ExtractionMethodSurface) {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return (SnippetType::JsonLdProduct, ExtractionMethodSurface::JsonLd);
    }
    let looks_tabular = body.lines().filter(|l| l.contains(':')).count() >= 2 || body.contains(" | ");
    if looks_tabular {
        (SnippetType::SpecTableRow, ExtractionMethodSurface::Table)
    } else {
        (SnippetType::Prose, ExtractionMethodSurface::Text)
    }
}

/// Append one source's snippet(s) to `pack`, returning the new source id.
pub fn append_page(pack: &mut EvidencePack, url: &str, host: &str, page: &FetchedPage, source_seq: usize) -> String {
    let source_id = format!("src-{source_seq}");
    let (kind, method) = classify(&page.body);

    pack.snippets.push(Snippet {
        id: format!("{source_id}-0"),
        source_id: source_id.clone(),
        kind,
        text: page.body.clone(),
        normalized_text: page.body.to_lowercase(),
        url: url.to_string(),
        snippet_hash: specf_utils::canonicalization::blake3_hex(page.body.as_bytes()),
        extraction_method: method,
    });

    pack.source_meta.insert(
        source_id.clone(),
        Source {
            source_id: source_id.clone(),
            url: url.to_string(),
            host: host.to_string(),
            root_domain: host.to_string(),
            tier: page.tier,
            role: page.role,
            approved_domain: page.tier.0 <= 3,
            candidate_source: page.tier.0 >= 4,
            discovered_from: None,
            priority_score: 0.0,
            display_name: None,
        },
    );

    source_id
}

/// Source role used for fields with no fetched evidence yet; never written
/// to a pack, only used to size default tiers in tests and fixtures.
#[must_use]
pub fn default_tier_for(role: SourceRole) -> Tier {
    match role {
        SourceRole::Manufacturer => Tier(1),
        SourceRole::Database => Tier(2),
        SourceRole::Retailer => Tier(3),
        SourceRole::Review => Tier(4),
        SourceRole::Other => Tier(5),
    }
}
