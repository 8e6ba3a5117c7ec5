//! Tiered query resolution.
//!
//! Tiers are strictly ordered: exact match, then orthographic variants
//! (singular/plural and stem prefix/suffix), then fuzzy similarity. The
//! first non-empty tier wins; later tiers are never mixed in. Every tier
//! filters on the confidence floor and sorts by descending confidence
//! with the source's nominal order as the stable tie-break, so repeated
//! queries against one snapshot return identical lists.

use mixplay_types::{MixConfig, WordOccurrence};

use crate::index::IndexSnapshot;

/// Queries shorter than this skip the stem-variant tier; two-letter
/// stems match far too much.
const MIN_STEM_LEN: usize = 3;

/// Resolve one normalized query token into a ranked candidate list.
pub fn search<'a>(
    snapshot: &'a IndexSnapshot,
    query: &str,
    config: &MixConfig,
) -> Vec<&'a WordOccurrence> {
    if query.is_empty() {
        return Vec::new();
    }

    let exact = rank(snapshot.word_candidates(query).iter().collect(), config);
    if !exact.is_empty() {
        return cap(exact, config.max_results);
    }

    let variants = rank(variant_candidates(snapshot, query), config);
    if !variants.is_empty() {
        return cap(variants, config.max_results);
    }

    cap(fuzzy_candidates(snapshot, query, config), config.max_results)
}

/// Best single candidate for a token, if any.
pub fn best_match<'a>(
    snapshot: &'a IndexSnapshot,
    query: &str,
    config: &MixConfig,
) -> Option<&'a WordOccurrence> {
    search(snapshot, query, config).into_iter().next()
}

/// Orthographic variants: trailing-s singular/plural swaps plus stem
/// prefix/suffix matches for queries of at least three characters.
fn variant_candidates<'a>(snapshot: &'a IndexSnapshot, query: &str) -> Vec<&'a WordOccurrence> {
    let pluralized = format!("{query}s");
    let mut keys: Vec<&str> = Vec::new();

    if let Some(stem) = query.strip_suffix('s') {
        if !stem.is_empty() {
            keys.push(stem);
        }
    }
    if !snapshot.word_candidates(&pluralized).is_empty() {
        keys.push(&pluralized);
    }

    if query.len() >= MIN_STEM_LEN {
        let mut stem_keys: Vec<&str> = snapshot
            .word_keys()
            .filter(|key| *key != query && (key.starts_with(query) || key.ends_with(query)))
            .collect();
        stem_keys.sort_unstable();
        for key in stem_keys {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    let mut out = Vec::new();
    let mut seen: Vec<*const WordOccurrence> = Vec::new();
    for key in keys {
        for candidate in snapshot.word_candidates(key) {
            let ptr = candidate as *const WordOccurrence;
            if !seen.contains(&ptr) {
                seen.push(ptr);
                out.push(candidate);
            }
        }
    }
    out
}

/// Fuzzy tier: similarity ratio over every indexed word, floor at the
/// configured threshold, ranked by descending ratio then confidence.
fn fuzzy_candidates<'a>(
    snapshot: &'a IndexSnapshot,
    query: &str,
    config: &MixConfig,
) -> Vec<&'a WordOccurrence> {
    let mut matched_keys: Vec<(&str, f64)> = snapshot
        .word_keys()
        .filter_map(|key| {
            let ratio = strsim::normalized_levenshtein(query, key);
            (ratio >= config.fuzzy_threshold).then_some((key, ratio))
        })
        .collect();

    // HashMap iteration order is arbitrary; sort for determinism.
    matched_keys.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    let mut out = Vec::new();
    for (key, _) in matched_keys {
        let mut per_key: Vec<&WordOccurrence> =
            rank(snapshot.word_candidates(key).iter().collect(), config);
        out.append(&mut per_key);
    }
    out
}

/// Confidence floor plus deterministic ordering within a tier.
fn rank<'a>(
    mut candidates: Vec<&'a WordOccurrence>,
    config: &MixConfig,
) -> Vec<&'a WordOccurrence> {
    candidates.retain(|c| c.confidence >= config.min_confidence);
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.source_id.cmp(&b.source_id))
            .then_with(|| {
                a.start
                    .partial_cmp(&b.start)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    candidates
}

fn cap<T>(mut candidates: Vec<T>, max_results: usize) -> Vec<T> {
    candidates.truncate(max_results.max(1));
    candidates
}
