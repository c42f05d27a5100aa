//! Bounded breadth-first site discovery.

use cutover_browser::{dom, BrowserContext};
use cutover_rest_api_contract::CrawlConfig;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::normalize::{normalize_url, same_origin};
use crate::patterns::PathFilter;
use crate::types::{PageRecord, SkippedPage};
use crate::{sitemap, Result};

/// Per-navigation bound while crawling.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// The result of crawling one site.
#[derive(Debug, Clone)]
pub struct SiteCrawl {
    pub seed: Url,
    pub pages: Vec<PageRecord>,
    pub skipped: Vec<SkippedPage>,
}

/// Crawl one site: BFS from the normalized seed, augmented by sitemap
/// entries, bounded by the job's crawl config. Discovery order is
/// deterministic for a fixed site and config.
pub async fn crawl_site(
    context: &dyn BrowserContext,
    seed_url: &Url,
    config: &CrawlConfig,
) -> Result<SiteCrawl> {
    let filter = PathFilter::new(&config.include_patterns, &config.exclude_patterns);
    let seed = normalize_url(seed_url);

    let mut page = context.new_page().await?;
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<(Url, u32)> = VecDeque::new();

    visited.insert(seed.to_string());
    frontier.push_back((seed.clone(), 0));

    for loc in sitemap::discover(page.as_mut(), &seed, NAVIGATION_TIMEOUT).await {
        let url = normalize_url(&loc);
        if !same_origin(&url, &seed) && !config.follow_external_links {
            continue;
        }
        if !filter.allows(url.path()) {
            continue;
        }
        if visited.insert(url.to_string()) {
            frontier.push_back((url, 0));
        }
    }

    let mut pages: Vec<PageRecord> = Vec::new();
    let mut skipped: Vec<SkippedPage> = Vec::new();

    while let Some((url, depth)) = frontier.pop_front() {
        if pages.len() >= config.max_pages as usize {
            break;
        }

        let navigation = match page.navigate(&url, NAVIGATION_TIMEOUT).await {
            Ok(nav) => nav,
            Err(e) => {
                trace!(url = %url, error = %e, "navigation failed");
                // A transport failure still yields a record (status 0)
                // so the page stays matchable; the capture stage owns
                // the final verdict for unreachable hosts.
                pages.push(PageRecord {
                    path: url.path().to_string(),
                    url: url.clone(),
                    title: None,
                    status: 0,
                    meta_tags: Default::default(),
                    depth,
                    discovery_index: pages.len(),
                });
                continue;
            }
        };

        if navigation.status >= 400 {
            skipped.push(SkippedPage {
                url: url.clone(),
                reason: format!("status {}", navigation.status),
            });
            continue;
        }

        let html = page.html().await.unwrap_or_default();
        pages.push(PageRecord {
            path: url.path().to_string(),
            url: url.clone(),
            title: dom::title(&html),
            status: navigation.status,
            meta_tags: dom::meta_tags(&html),
            depth,
            discovery_index: pages.len(),
        });

        if depth >= config.max_depth {
            continue;
        }
        for link in page.links().await.unwrap_or_default() {
            if !link.is_network_navigable() {
                continue;
            }
            let Ok(parsed) = Url::parse(&link.href) else {
                continue;
            };
            if !matches!(parsed.scheme(), "http" | "https") {
                continue;
            }
            let next = normalize_url(&parsed);
            if !same_origin(&next, &seed) && !config.follow_external_links {
                continue;
            }
            if !filter.allows(next.path()) {
                continue;
            }
            if visited.insert(next.to_string()) {
                frontier.push_back((next, depth + 1));
            }
        }
    }

    page.close().await?;
    debug!(
        seed = %seed,
        pages = pages.len(),
        skipped = skipped.len(),
        "site crawl finished"
    );
    Ok(SiteCrawl {
        seed,
        pages,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutover_browser::{BrowserDriver, PageScript, ScriptedBrowserDriver};

    fn site() -> ScriptedBrowserDriver {
        ScriptedBrowserDriver::builder()
            .page(
                "https://a.test/",
                PageScript::ok(
                    r#"<html><head><title>Home</title></head><body>
                    <a href="/about">About</a>
                    <a href="/blog">Blog</a>
                    <a href="/about#team">Team anchor</a>
                    <a href="https://other.test/">External</a>
                    </body></html>"#,
                ),
            )
            .page(
                "https://a.test/about",
                PageScript::ok(
                    r#"<html><head><title>About</title></head><body>
                    <a href="/hidden-deep">Deep</a></body></html>"#,
                ),
            )
            .page(
                "https://a.test/blog",
                PageScript::ok("<html><head><title>Blog</title></head><body></body></html>"),
            )
            .page(
                "https://a.test/hidden-deep",
                PageScript::ok("<html><head><title>Deep</title></head><body></body></html>"),
            )
            .page(
                "https://a.test/missing",
                PageScript::ok("gone").with_status(404),
            )
            .build()
    }

    fn config(depth: u32, max_pages: u32) -> CrawlConfig {
        CrawlConfig {
            max_depth: depth,
            max_pages,
            ..CrawlConfig::default()
        }
    }

    #[tokio::test]
    async fn bfs_respects_depth_and_dedupes_fragments() {
        let driver = site();
        let ctx = driver.new_context().await.unwrap();
        let seed = Url::parse("https://a.test/").unwrap();

        let crawl = crawl_site(ctx.as_ref(), &seed, &config(1, 10)).await.unwrap();
        let paths: Vec<&str> = crawl.pages.iter().map(|p| p.path.as_str()).collect();
        // Depth 1 stops before /hidden-deep; the fragment link dedupes
        // onto /about; the external link is dropped.
        assert_eq!(paths, vec!["/", "/about", "/blog"]);
        assert_eq!(crawl.pages[0].title.as_deref(), Some("Home"));
        assert_eq!(crawl.pages[1].depth, 1);
    }

    #[tokio::test]
    async fn depth_zero_crawls_only_the_seed() {
        let driver = site();
        let ctx = driver.new_context().await.unwrap();
        let seed = Url::parse("https://a.test/").unwrap();

        let crawl = crawl_site(ctx.as_ref(), &seed, &config(0, 10)).await.unwrap();
        assert_eq!(crawl.pages.len(), 1);
        assert_eq!(crawl.pages[0].path, "/");
    }

    #[tokio::test]
    async fn max_pages_bounds_discovery() {
        let driver = site();
        let ctx = driver.new_context().await.unwrap();
        let seed = Url::parse("https://a.test/").unwrap();

        let crawl = crawl_site(ctx.as_ref(), &seed, &config(3, 2)).await.unwrap();
        assert_eq!(crawl.pages.len(), 2);
    }

    #[tokio::test]
    async fn error_status_pages_are_skipped() {
        let driver = ScriptedBrowserDriver::builder()
            .page(
                "https://a.test/",
                PageScript::ok(r#"<html><body><a href="/missing">m</a></body></html>"#),
            )
            .page("https://a.test/missing", PageScript::ok("gone").with_status(404))
            .build();
        let ctx = driver.new_context().await.unwrap();
        let seed = Url::parse("https://a.test/").unwrap();

        let crawl = crawl_site(ctx.as_ref(), &seed, &config(1, 10)).await.unwrap();
        assert_eq!(crawl.pages.len(), 1);
        assert_eq!(crawl.skipped.len(), 1);
        assert_eq!(crawl.skipped[0].reason, "status 404");
    }

    #[tokio::test]
    async fn unreachable_seed_yields_status_zero_record() {
        let driver = ScriptedBrowserDriver::builder().build();
        let ctx = driver.new_context().await.unwrap();
        let seed = Url::parse("https://gone.test/").unwrap();

        let crawl = crawl_site(ctx.as_ref(), &seed, &config(1, 10)).await.unwrap();
        assert_eq!(crawl.pages.len(), 1);
        assert_eq!(crawl.pages[0].status, 0);
        assert_eq!(crawl.pages[0].path, "/");
    }

    #[tokio::test]
    async fn include_patterns_gate_the_frontier() {
        let driver = site();
        let ctx = driver.new_context().await.unwrap();
        let seed = Url::parse("https://a.test/").unwrap();
        let config = CrawlConfig {
            max_depth: 2,
            max_pages: 10,
            include_patterns: vec!["/".into(), "/about*".into()],
            ..CrawlConfig::default()
        };

        let crawl = crawl_site(ctx.as_ref(), &seed, &config).await.unwrap();
        let paths: Vec<&str> = crawl.pages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/about"]);
    }
}
