//! Site discovery and cross-site page matching.
//!
//! For each side of a comparison the engine runs a bounded
//! breadth-first crawl seeded at the site root and its sitemap, then
//! pairs the two discovered page sets: explicit page-map entries
//! first, then normalized-path equality, then title equality. The
//! output is the matched-page list every later stage consumes.

pub mod engine;
pub mod matching;
pub mod normalize;
pub mod patterns;
pub mod sitemap;
pub mod types;

pub use engine::{crawl_site, SiteCrawl};
pub use matching::{match_pages, MatchOutcome};
pub use normalize::{normalize_url, same_origin};
pub use patterns::PathFilter;
pub use types::{MatchReason, MatchedPage, PageRecord, PageRef, SkippedPage};

/// Crawl engine error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Crawl error: {message}")]
    Crawl { message: String },

    #[error("Browser error: {0}")]
    Browser(#[from] cutover_browser::Error),
}

impl Error {
    /// Create a new crawl error.
    pub fn crawl<S: Into<String>>(message: S) -> Self {
        Self::Crawl {
            message: message.into(),
        }
    }
}

/// Convenience result alias for crawl operations.
pub type Result<T> = std::result::Result<T, Error>;
