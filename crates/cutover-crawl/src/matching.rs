//! Cross-site page matching.
//!
//! Rules apply in order, each matched page leaving the pool: explicit
//! page-map pairs (confidence 1.0), normalized-path equality (0.9),
//! case-insensitive title equality (0.7). Within a rule the baseline
//! side iterates in discovery order and takes the earliest-discovered
//! candidate, which keeps the output deterministic.

use cutover_rest_api_contract::PageMapEntry;
use url::Url;

use crate::normalize::normalize_url;
use crate::types::{MatchReason, MatchedPage, PageRecord, PageRef};

/// Result of matching the two discovered page sets.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedPage>,
    pub unmatched_baseline: Vec<PageRecord>,
    pub unmatched_candidate: Vec<PageRecord>,
}

impl MatchOutcome {
    /// The page map derived from the matches, committed as an artifact
    /// so a later job revision can pin the pairing down.
    pub fn derived_page_map(&self) -> Vec<PageMapEntry> {
        self.matched.iter().map(MatchedPage::to_page_map_entry).collect()
    }
}

/// Normalize a user-supplied page-map path: leading slash enforced,
/// trailing slash collapsed.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    let mut out = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };
    while out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Take the earliest-discovered unconsumed record satisfying `pred`.
fn take_first<'a>(
    records: &'a [PageRecord],
    consumed: &mut [bool],
    pred: impl Fn(&PageRecord) -> bool,
) -> Option<&'a PageRecord> {
    for (i, record) in records.iter().enumerate() {
        if !consumed[i] && pred(record) {
            consumed[i] = true;
            return Some(record);
        }
    }
    None
}

/// A page ref for an explicit pair, backed by the crawled record when
/// one exists and synthesized from the origin otherwise.
fn explicit_ref(record: Option<&PageRecord>, origin: &Url, path: &str) -> PageRef {
    match record {
        Some(record) => record.into(),
        None => {
            let url = origin
                .join(path)
                .map(|u| normalize_url(&u))
                .unwrap_or_else(|_| origin.clone());
            PageRef {
                url,
                path: path.to_string(),
                title: None,
            }
        }
    }
}

/// Match the two sides. `page_map` entries dominate, then paths, then
/// titles.
pub fn match_pages(
    page_map: &[PageMapEntry],
    baseline_origin: &Url,
    candidate_origin: &Url,
    baseline: &[PageRecord],
    candidate: &[PageRecord],
) -> MatchOutcome {
    let mut consumed_b = vec![false; baseline.len()];
    let mut consumed_c = vec![false; candidate.len()];
    let mut matched = Vec::new();

    for entry in page_map {
        let b_path = normalize_path(&entry.baseline_path);
        let c_path = normalize_path(&entry.candidate_path);
        let b_record = take_first(baseline, &mut consumed_b, |r| r.path == b_path);
        let c_record = take_first(candidate, &mut consumed_c, |r| r.path == c_path);
        matched.push(MatchedPage {
            baseline: explicit_ref(b_record, baseline_origin, &b_path),
            candidate: explicit_ref(c_record, candidate_origin, &c_path),
            confidence: 1.0,
            reason: MatchReason::Explicit,
        });
    }

    for (i, b) in baseline.iter().enumerate() {
        if consumed_b[i] {
            continue;
        }
        if let Some(c) = take_first(candidate, &mut consumed_c, |r| r.path == b.path) {
            consumed_b[i] = true;
            matched.push(MatchedPage {
                baseline: b.into(),
                candidate: c.into(),
                confidence: 0.9,
                reason: MatchReason::Path,
            });
        }
    }

    for (i, b) in baseline.iter().enumerate() {
        if consumed_b[i] {
            continue;
        }
        let Some(title) = b.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            continue;
        };
        let matches_title = |r: &PageRecord| {
            r.title
                .as_deref()
                .map(str::trim)
                .is_some_and(|t| t.eq_ignore_ascii_case(title))
        };
        if let Some(c) = take_first(candidate, &mut consumed_c, matches_title) {
            consumed_b[i] = true;
            matched.push(MatchedPage {
                baseline: b.into(),
                candidate: c.into(),
                confidence: 0.7,
                reason: MatchReason::Title,
            });
        }
    }

    let unmatched_baseline = baseline
        .iter()
        .zip(&consumed_b)
        .filter(|(_, used)| !**used)
        .map(|(r, _)| r.clone())
        .collect();
    let unmatched_candidate = candidate
        .iter()
        .zip(&consumed_c)
        .filter(|(_, used)| !**used)
        .map(|(r, _)| r.clone())
        .collect();

    MatchOutcome {
        matched,
        unmatched_baseline,
        unmatched_candidate,
    }
}
