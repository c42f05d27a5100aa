//! Deterministic in-memory driver for pipeline tests.
//!
//! Tests script each URL's status, HTML, console traffic, JS errors
//! and form behavior up front; the driver then replays them. URLs
//! that were not scripted fail navigation the way an unreachable host
//! would, which is how tests exercise the fatal-capture path.

use async_trait::async_trait;
use chrono::Utc;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::dom;
use crate::driver::{BrowserContext, BrowserDriver, BrowserPage};
use crate::error::{Error, Result};
use crate::raster::render_content_raster;
use crate::types::{
    ConsoleLevel, ConsoleMessage, FormSnapshot, JsError, LinkRef, Navigation, NetworkEvent,
    NetworkRequest, NetworkResponse, SubmitOutcome, Viewport,
};

/// Scripted behavior of one URL.
#[derive(Debug, Clone)]
pub struct PageScript {
    pub status: u16,
    pub html: String,
    pub load_time_ms: u64,
    pub redirect_to: Option<Url>,
    pub console: Vec<ConsoleMessage>,
    pub js_errors: Vec<JsError>,
    pub submit_outcome: SubmitOutcome,
}

impl PageScript {
    /// A 200 page serving the given HTML.
    pub fn ok<S: Into<String>>(html: S) -> Self {
        Self {
            status: 200,
            html: html.into(),
            load_time_ms: 25,
            redirect_to: None,
            console: Vec::new(),
            js_errors: Vec::new(),
            submit_outcome: SubmitOutcome::Success { status: 200 },
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_redirect(mut self, to: Url) -> Self {
        self.redirect_to = Some(to);
        self
    }

    pub fn with_console_error<S: Into<String>>(mut self, text: S) -> Self {
        self.console.push(ConsoleMessage {
            level: ConsoleLevel::Error,
            text: text.into(),
            timestamp: Utc::now(),
        });
        self
    }

    pub fn with_js_error<S: Into<String>>(mut self, message: S) -> Self {
        self.js_errors.push(JsError {
            message: message.into(),
            source: Some("app.js".into()),
            line: Some(1),
            column: Some(1),
            stack: None,
            timestamp: Utc::now(),
        });
        self
    }

    pub fn with_submit_outcome(mut self, outcome: SubmitOutcome) -> Self {
        self.submit_outcome = outcome;
        self
    }
}

#[derive(Default)]
struct ScriptedSite {
    pages: HashMap<String, PageScript>,
}

/// Deterministic driver over a fixed URL → script table.
#[derive(Clone, Default)]
pub struct ScriptedBrowserDriver {
    site: Arc<ScriptedSite>,
    open_contexts: Arc<AtomicUsize>,
}

/// Builder for [`ScriptedBrowserDriver`].
#[derive(Default)]
pub struct ScriptedSiteBuilder {
    pages: HashMap<String, PageScript>,
}

impl ScriptedSiteBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script one URL. The key is the exact URL string after `Url`
    /// normalization.
    pub fn page(mut self, url: &str, script: PageScript) -> Self {
        let key = Url::parse(url).expect("scripted URL must be absolute").to_string();
        self.pages.insert(key, script);
        self
    }

    pub fn build(self) -> ScriptedBrowserDriver {
        ScriptedBrowserDriver {
            site: Arc::new(ScriptedSite { pages: self.pages }),
            open_contexts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ScriptedBrowserDriver {
    pub fn builder() -> ScriptedSiteBuilder {
        ScriptedSiteBuilder::new()
    }

    /// How many contexts are currently open; tests assert this drops
    /// to zero when a run reaches a terminal state.
    pub fn open_context_count(&self) -> usize {
        self.open_contexts.load(Ordering::SeqCst)
    }
}

struct ScriptedContext {
    site: Arc<ScriptedSite>,
    open_contexts: Arc<AtomicUsize>,
    closed: AtomicUsize,
}

#[async_trait]
impl BrowserDriver for ScriptedBrowserDriver {
    async fn new_context(&self) -> Result<Arc<dyn BrowserContext>> {
        self.open_contexts.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedContext {
            site: Arc::clone(&self.site),
            open_contexts: Arc::clone(&self.open_contexts),
            closed: AtomicUsize::new(0),
        }))
    }
}

#[async_trait]
impl BrowserContext for ScriptedContext {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        Ok(Box::new(ScriptedPage {
            site: Arc::clone(&self.site),
            viewport: Viewport::new("desktop", 1920, 1080),
            history: Vec::new(),
            current: None,
            network: Vec::new(),
        }))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.fetch_add(1, Ordering::SeqCst) == 0 {
            self.open_contexts.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct ScriptedPage {
    site: Arc<ScriptedSite>,
    viewport: Viewport,
    history: Vec<Url>,
    current: Option<(Url, PageScript)>,
    network: Vec<NetworkEvent>,
}

impl ScriptedPage {
    fn current(&self) -> Result<&(Url, PageScript)> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::driver("no document loaded"))
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    async fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.viewport = viewport.clone();
        Ok(())
    }

    async fn navigate(&mut self, url: &Url, _timeout: Duration) -> Result<Navigation> {
        self.network.clear();
        let request = NetworkRequest {
            url: url.to_string(),
            method: "GET".into(),
            timestamp: Utc::now(),
        };

        let site = Arc::clone(&self.site);
        let Some(script) = site.pages.get(url.as_str()) else {
            self.network.push(NetworkEvent {
                request,
                response: None,
                failure: Some("net::ERR_NAME_NOT_RESOLVED".into()),
            });
            return Err(Error::navigation(format!("cannot resolve {url}")));
        };

        let (final_url, script, chain) = match &script.redirect_to {
            Some(target) => {
                let target_script = site.pages.get(target.as_str()).ok_or_else(|| {
                    Error::navigation(format!("redirect target {target} not scripted"))
                })?;
                (
                    target.clone(),
                    target_script.clone(),
                    vec![url.clone(), target.clone()],
                )
            }
            None => (url.clone(), script.clone(), Vec::new()),
        };

        self.network.push(NetworkEvent {
            request,
            response: Some(NetworkResponse {
                status: script.status,
                status_text: String::new(),
                headers: Default::default(),
                timestamp: Utc::now(),
            }),
            failure: None,
        });

        let navigation = Navigation {
            final_url: final_url.clone(),
            status: script.status,
            status_text: String::new(),
            load_time_ms: script.load_time_ms,
            redirect_chain: chain,
        };
        if let Some((previous, _)) = self.current.take() {
            self.history.push(previous);
        }
        self.current = Some((final_url, script));
        Ok(navigation)
    }

    async fn screenshot(&mut self) -> Result<RgbaImage> {
        let (_, script) = self.current()?;
        let text = dom::visible_text(&script.html);
        Ok(render_content_raster(&text, &self.viewport))
    }

    async fn html(&self) -> Result<String> {
        Ok(self.current()?.1.html.clone())
    }

    async fn visible_text(&self) -> Result<String> {
        Ok(dom::visible_text(&self.current()?.1.html))
    }

    fn console_messages(&self) -> Vec<ConsoleMessage> {
        self.current
            .as_ref()
            .map(|(_, s)| s.console.clone())
            .unwrap_or_default()
    }

    fn network_events(&self) -> Vec<NetworkEvent> {
        self.network.clone()
    }

    fn js_errors(&self) -> Vec<JsError> {
        self.current
            .as_ref()
            .map(|(_, s)| s.js_errors.clone())
            .unwrap_or_default()
    }

    async fn forms(&self) -> Result<Vec<FormSnapshot>> {
        Ok(dom::forms(&self.current()?.1.html))
    }

    async fn submit_form(
        &mut self,
        _form: &FormSnapshot,
        _values: &[(String, String)],
        _timeout: Duration,
    ) -> Result<SubmitOutcome> {
        Ok(self.current()?.1.submit_outcome.clone())
    }

    async fn links(&self) -> Result<Vec<LinkRef>> {
        let (url, script) = self.current()?;
        Ok(dom::links(&script.html, url))
    }

    async fn go_back(&mut self, timeout: Duration) -> Result<()> {
        let Some(previous) = self.history.pop() else {
            return Err(Error::driver("history is empty"));
        };
        self.navigate(&previous, timeout).await?;
        self.history.pop();
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.current = None;
        self.network.clear();
        self.history.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> ScriptedBrowserDriver {
        ScriptedBrowserDriver::builder()
            .page(
                "https://a.test/",
                PageScript::ok("<html><body><h1>Home</h1><a href=\"/about\">About</a></body></html>"),
            )
            .page(
                "https://a.test/about",
                PageScript::ok("<html><body><h1>About</h1></body></html>")
                    .with_js_error("boom"),
            )
            .build()
    }

    #[tokio::test]
    async fn replays_scripted_pages() {
        let driver = driver();
        let ctx = driver.new_context().await.unwrap();
        let mut page = ctx.new_page().await.unwrap();

        let nav = page
            .navigate(&Url::parse("https://a.test/").unwrap(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(nav.status, 200);
        assert!(page.visible_text().await.unwrap().contains("Home"));
        assert_eq!(page.links().await.unwrap()[0].href, "https://a.test/about");

        let nav = page
            .navigate(&Url::parse("https://a.test/about").unwrap(), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(nav.status, 200);
        assert_eq!(page.js_errors().len(), 1);

        page.go_back(Duration::from_secs(30)).await.unwrap();
        assert!(page.visible_text().await.unwrap().contains("Home"));
    }

    #[tokio::test]
    async fn unknown_urls_fail_navigation() {
        let driver = driver();
        let ctx = driver.new_context().await.unwrap();
        let mut page = ctx.new_page().await.unwrap();
        let err = page
            .navigate(&Url::parse("https://gone.test/").unwrap(), Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Navigation { .. }));
    }

    #[tokio::test]
    async fn context_close_is_idempotent() {
        let driver = driver();
        let ctx = driver.new_context().await.unwrap();
        assert_eq!(driver.open_context_count(), 1);
        ctx.close().await.unwrap();
        ctx.close().await.unwrap();
        assert_eq!(driver.open_context_count(), 0);
    }
}
