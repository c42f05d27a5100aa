//! Sitemap ingestion: `sitemap.xml` entries become additional depth-0
//! seeds, and sitemap indexes are followed recursively with bounded
//! depth and fetch count.

use cutover_browser::BrowserPage;
use std::time::Duration;
use tracing::debug;
use url::Url;

const MAX_INDEX_DEPTH: usize = 3;
const MAX_SITEMAP_FETCHES: usize = 16;

/// Fetch the origin's sitemap tree and return every page URL listed.
/// Failures are logged and yield an empty set; a missing sitemap is
/// not an error.
pub async fn discover(page: &mut dyn BrowserPage, origin: &Url, timeout: Duration) -> Vec<Url> {
    let Ok(root) = origin.join("/sitemap.xml") else {
        return Vec::new();
    };

    let mut worklist = vec![(root, 0usize)];
    let mut fetched = 0usize;
    let mut urls = Vec::new();

    while let Some((sitemap_url, depth)) = worklist.pop() {
        if fetched >= MAX_SITEMAP_FETCHES {
            break;
        }
        fetched += 1;

        let body = match page.navigate(&sitemap_url, timeout).await {
            Ok(nav) if nav.status < 400 => page.html().await.unwrap_or_default(),
            Ok(nav) => {
                debug!(url = %sitemap_url, status = nav.status, "sitemap fetch skipped");
                continue;
            }
            Err(e) => {
                debug!(url = %sitemap_url, error = %e, "sitemap fetch failed");
                continue;
            }
        };

        let locs = extract_locs(&body);
        if body.contains("<sitemapindex") {
            if depth < MAX_INDEX_DEPTH {
                for loc in locs {
                    if let Ok(nested) = Url::parse(&loc) {
                        worklist.push((nested, depth + 1));
                    }
                }
            }
        } else {
            for loc in locs {
                if let Ok(url) = Url::parse(&loc) {
                    urls.push(url);
                }
            }
        }
    }
    urls
}

/// Pull the text content of every `<loc>` element.
fn extract_locs(xml: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = xml;
    while let Some(start) = rest.find("<loc>") {
        rest = &rest[start + 5..];
        let Some(end) = rest.find("</loc>") else {
            break;
        };
        let loc = rest[..end].trim();
        if !loc.is_empty() {
            out.push(loc.to_string());
        }
        rest = &rest[end + 6..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_loc_entries() {
        let xml = r#"<?xml version="1.0"?>
            <urlset><url><loc>https://a.test/</loc></url>
            <url><loc> https://a.test/about </loc></url></urlset>"#;
        assert_eq!(
            extract_locs(xml),
            vec!["https://a.test/", "https://a.test/about"]
        );
    }

    #[test]
    fn tolerates_malformed_documents() {
        assert!(extract_locs("<urlset><loc>broken").is_empty());
        assert!(extract_locs("no xml here").is_empty());
    }
}
