//! reqwest-backed driver for environments without a browser runtime.
//!
//! Navigation, redirects, status codes, headers, timings, HTML and the
//! link/form surface are all real; screenshots are deterministic
//! content rasters (see [`crate::raster::render_content_raster`]) and
//! the script-level evidence channels (console, JS errors) stay empty
//! because nothing executes scripts. A CDP-backed driver replaces this
//! one wherever real rendering fidelity is required.

use async_trait::async_trait;
use chrono::Utc;
use image::RgbaImage;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::dom;
use crate::driver::{BrowserContext, BrowserDriver, BrowserPage};
use crate::error::{Error, Result};
use crate::raster::render_content_raster;
use crate::types::{
    ConsoleMessage, FormSnapshot, JsError, LinkRef, Navigation, NetworkEvent, NetworkRequest,
    NetworkResponse, SubmitOutcome, Viewport,
};

/// Driver entry point. One shared connection pool; contexts are
/// isolated at the page-state level.
#[derive(Debug, Clone)]
pub struct HttpBrowserDriver {
    client: reqwest::Client,
}

impl HttpBrowserDriver {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("cutover-capture/0.1")
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }
}

struct HttpContext {
    client: reqwest::Client,
}

#[async_trait]
impl BrowserDriver for HttpBrowserDriver {
    async fn new_context(&self) -> Result<Arc<dyn BrowserContext>> {
        Ok(Arc::new(HttpContext {
            client: self.client.clone(),
        }))
    }
}

#[async_trait]
impl BrowserContext for HttpContext {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            viewport: Viewport::new("desktop", 1920, 1080),
            history: Vec::new(),
            current: None,
            network: Vec::new(),
        }))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

struct LoadedDocument {
    url: Url,
    requested: Url,
    status: u16,
    status_text: String,
    html: String,
}

struct HttpPage {
    client: reqwest::Client,
    viewport: Viewport,
    history: Vec<Url>,
    current: Option<LoadedDocument>,
    network: Vec<NetworkEvent>,
}

impl HttpPage {
    fn document(&self) -> Result<&LoadedDocument> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::driver("no document loaded"))
    }

    async fn fetch(&mut self, url: &Url, timeout: Duration) -> Result<LoadedDocument> {
        let request = NetworkRequest {
            url: url.to_string(),
            method: "GET".into(),
            timestamp: Utc::now(),
        };
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let status_text = resp
                    .status()
                    .canonical_reason()
                    .unwrap_or_default()
                    .to_string();
                let final_url = resp.url().clone();
                let mut headers = BTreeMap::new();
                for (name, value) in resp.headers() {
                    headers.insert(
                        name.as_str().to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    );
                }
                self.network.push(NetworkEvent {
                    request,
                    response: Some(NetworkResponse {
                        status,
                        status_text: status_text.clone(),
                        headers,
                        timestamp: Utc::now(),
                    }),
                    failure: None,
                });
                let html = resp.text().await.unwrap_or_default();
                Ok(LoadedDocument {
                    url: final_url,
                    requested: url.clone(),
                    status,
                    status_text,
                    html,
                })
            }
            Err(e) => {
                self.network.push(NetworkEvent {
                    request,
                    response: None,
                    failure: Some(e.to_string()),
                });
                if e.is_timeout() {
                    Err(Error::timeout(timeout.as_secs()))
                } else {
                    Err(Error::navigation(format!("failed to fetch {url}: {e}")))
                }
            }
        }
    }
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn set_viewport(&mut self, viewport: &Viewport) -> Result<()> {
        self.viewport = viewport.clone();
        Ok(())
    }

    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<Navigation> {
        self.network.clear();
        let started = Instant::now();
        let doc = self.fetch(url, timeout).await?;
        let navigation = Navigation {
            final_url: doc.url.clone(),
            status: doc.status,
            status_text: doc.status_text.clone(),
            load_time_ms: started.elapsed().as_millis() as u64,
            redirect_chain: if doc.url != doc.requested {
                vec![doc.requested.clone(), doc.url.clone()]
            } else {
                Vec::new()
            },
        };
        if let Some(previous) = self.current.take() {
            self.history.push(previous.url);
        }
        self.current = Some(doc);
        Ok(navigation)
    }

    async fn screenshot(&mut self) -> Result<RgbaImage> {
        let doc = self.document()?;
        let text = dom::visible_text(&doc.html);
        Ok(render_content_raster(&text, &self.viewport))
    }

    async fn html(&self) -> Result<String> {
        Ok(self.document()?.html.clone())
    }

    async fn visible_text(&self) -> Result<String> {
        Ok(dom::visible_text(&self.document()?.html))
    }

    fn console_messages(&self) -> Vec<ConsoleMessage> {
        // Nothing executes scripts in this driver.
        Vec::new()
    }

    fn network_events(&self) -> Vec<NetworkEvent> {
        self.network.clone()
    }

    fn js_errors(&self) -> Vec<JsError> {
        Vec::new()
    }

    async fn forms(&self) -> Result<Vec<FormSnapshot>> {
        Ok(dom::forms(&self.document()?.html))
    }

    async fn submit_form(
        &mut self,
        form: &FormSnapshot,
        values: &[(String, String)],
        timeout: Duration,
    ) -> Result<SubmitOutcome> {
        let doc = self.document()?;
        let action = match &form.action {
            Some(action) => doc
                .url
                .join(action)
                .map_err(|e| Error::driver(format!("unresolvable form action {action:?}: {e}")))?,
            None => doc.url.clone(),
        };

        let request = if form.method == "post" {
            self.client.post(action).form(&values.to_vec())
        } else {
            self.client.get(action).query(&values.to_vec())
        };

        match request.timeout(timeout).send().await {
            Ok(resp) if resp.status().as_u16() < 500 => Ok(SubmitOutcome::Success {
                status: resp.status().as_u16(),
            }),
            Ok(resp) => Ok(SubmitOutcome::Error {
                message: format!("server returned {}", resp.status()),
            }),
            Err(e) if e.is_timeout() => Ok(SubmitOutcome::SubmittedNoResponse),
            Err(e) => Ok(SubmitOutcome::Error {
                message: e.to_string(),
            }),
        }
    }

    async fn links(&self) -> Result<Vec<LinkRef>> {
        let doc = self.document()?;
        Ok(dom::links(&doc.html, &doc.url))
    }

    async fn go_back(&mut self, timeout: Duration) -> Result<()> {
        let Some(previous) = self.history.pop() else {
            return Err(Error::driver("history is empty"));
        };
        self.navigate(&previous, timeout).await?;
        // navigate() pushed the page we just left; drop that entry so
        // repeated probes do not grow the history.
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
