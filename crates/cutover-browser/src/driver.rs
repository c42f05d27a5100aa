//! The browser driver capability.
//!
//! A driver hands out isolated contexts (one per site side during a
//! run); contexts hand out pages. Pages accumulate console, network
//! and error evidence from the moment of their last navigation.

use async_trait::async_trait;
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::Result;
use crate::types::{
    ConsoleMessage, FormSnapshot, JsError, LinkRef, Navigation, NetworkEvent, SubmitOutcome,
    Viewport,
};

/// One open page inside a browser context.
#[async_trait]
pub trait BrowserPage: Send {
    /// Resize the page to the given viewport.
    async fn set_viewport(&mut self, viewport: &Viewport) -> Result<()>;

    /// Navigate and wait for the network to go idle, bounded by
    /// `timeout`. Clears the evidence buffers.
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> Result<Navigation>;

    /// Full-page screenshot of the current document.
    async fn screenshot(&mut self) -> Result<RgbaImage>;

    /// The current document's HTML.
    async fn html(&self) -> Result<String>;

    /// The current document's visible text.
    async fn visible_text(&self) -> Result<String>;

    /// Console messages observed since the last navigation.
    fn console_messages(&self) -> Vec<ConsoleMessage>;

    /// Network activity observed since the last navigation.
    fn network_events(&self) -> Vec<NetworkEvent>;

    /// JavaScript errors observed since the last navigation.
    fn js_errors(&self) -> Vec<JsError>;

    /// Forms present on the current document.
    async fn forms(&self) -> Result<Vec<FormSnapshot>>;

    /// Fill and submit one form with the given field values.
    async fn submit_form(
        &mut self,
        form: &FormSnapshot,
        values: &[(String, String)],
        timeout: Duration,
    ) -> Result<SubmitOutcome>;

    /// Anchors present on the current document.
    async fn links(&self) -> Result<Vec<LinkRef>>;

    /// Navigate back to the previous document.
    async fn go_back(&mut self, timeout: Duration) -> Result<()>;

    /// Release page resources. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// An isolated browsing context. Stages sharing a context open their
/// own pages and close them; the orchestrator closes the context once
/// when the run reaches a terminal state.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    /// Open a fresh page.
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>>;

    /// Close the context and everything in it. Idempotent.
    async fn close(&self) -> Result<()>;
}

/// Entry point of the capability: creates contexts.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Create a new isolated context.
    async fn new_context(&self) -> Result<Arc<dyn BrowserContext>>;
}
