//! Crawl and matching data types. These are serialized as run
//! artifacts so later stages and clients can consume them.

use cutover_rest_api_contract::PageMapEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// One page discovered during a site crawl. `status` 0 marks a
/// transport failure (the host never answered).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    pub url: Url,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: u16,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub meta_tags: BTreeMap<String, String>,
    pub depth: u32,
    pub discovery_index: usize,
}

/// A URL the crawl fetched but refused to record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedPage {
    pub url: Url,
    pub reason: String,
}

/// The slice of a page the matcher and the capture stage need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRef {
    pub url: Url,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl From<&PageRecord> for PageRef {
    fn from(record: &PageRecord) -> Self {
        Self {
            url: record.url.clone(),
            path: record.path.clone(),
            title: record.title.clone(),
        }
    }
}

/// Which rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchReason {
    Explicit,
    Path,
    Title,
}

/// A `(baseline, candidate)` pair the pipeline treats as equivalent
/// comparison targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPage {
    pub baseline: PageRef,
    pub candidate: PageRef,
    pub confidence: f64,
    pub reason: MatchReason,
}

impl MatchedPage {
    /// The page-map entry this match derives to.
    pub fn to_page_map_entry(&self) -> PageMapEntry {
        PageMapEntry {
            baseline_path: self.baseline.path.clone(),
            candidate_path: self.candidate.path.clone(),
            notes: Some(format!("matched by {:?}", self.reason).to_lowercase()),
        }
    }
}
