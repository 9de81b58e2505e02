//! String similarity used by the deterministic parser's spec-row strategy
//! and by component fuzzy matching.

use std::collections::HashSet;

/// Lowercase, trim, and collapse whitespace/punctuation runs into single
/// spaces so "Polling Rate:" and "polling_rate" compare equal.
#[must_use]
pub fn normalize_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = true;
    for ch in s.trim().chars() {
        let mapped = if ch.is_alphanumeric() { Some(ch.to_ascii_lowercase()) } else { Some(' ') };
        match mapped {
            Some(' ') => {
                if !last_was_space {
                    out.push(' ');
                }
                last_was_space = true;
            }
            Some(c) => {
                out.push(c);
                last_was_space = false;
            }
            None => {}
        }
    }
    out.trim().to_string()
}

/// Character-bag Jaccard similarity: `|intersection| / |union|` over the
/// distinct character sets of the two normalized strings.
#[must_use]
pub fn char_bag_jaccard(a: &str, b: &str) -> f64 {
    let na = normalize_key(a);
    let nb = normalize_key(b);
    let set_a: HashSet<char> = na.chars().filter(|c| !c.is_whitespace()).collect();
    let set_b: HashSet<char> = nb.chars().filter(|c| !c.is_whitespace()).collect();
    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Score how well `key` matches one of a field's `variants` (its canonical
/// name plus synonyms/context keywords):
/// exact match after normalization = 1.0, keyword-substring = 0.9,
/// character-bag Jaccard otherwise.
#[must_use]
pub fn key_similarity(key: &str, variants: &[&str]) -> f64 {
    let nk = normalize_key(key);
    let mut best = 0.0_f64;
    for variant in variants {
        let nv = normalize_key(variant);
        if nv.is_empty() {
            continue;
        }
        let score = if nk == nv {
            1.0
        } else if nk.contains(&nv) || nv.contains(&nk) {
            0.9
        } else {
            char_bag_jaccard(&nk, &nv)
        };
        if score > best {
            best = score;
        }
    }
    best
}
