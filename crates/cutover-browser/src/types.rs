//! Evidence types observed through the browser boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// A named viewport size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new<S: Into<String>>(name: S, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }

    /// The fixed capture set: desktop, tablet, mobile.
    pub fn defaults() -> Vec<Viewport> {
        vec![
            Viewport::new("desktop", 1920, 1080),
            Viewport::new("tablet", 768, 1024),
            Viewport::new("mobile", 375, 667),
        ]
    }
}

/// Outcome of a page navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    pub final_url: Url,
    pub status: u16,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub status_text: String,
    pub load_time_ms: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub redirect_chain: Vec<Url>,
}

/// Console message severity as reported by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
}

/// One console message observed during a page's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// An outbound request observed on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    pub url: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
}

/// The response to an observed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub status_text: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub headers: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

/// A request paired with its response, or with the failure that ended
/// it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEvent {
    pub request: NetworkRequest,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<NetworkResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// A page-level JavaScript error: console errors, uncaught exceptions,
/// and unhandled promise rejections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// What an input field accepts, as far as form heuristics care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldKind {
    Text,
    Email,
    Textarea,
    Select,
    Other,
}

/// One fillable field of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    pub kind: FormFieldKind,
    /// Option values for selects, in document order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub options: Vec<String>,
}

/// A form as observed on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSnapshot {
    /// Index of the form in document order.
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub method: String,
    pub fields: Vec<FormField>,
}

/// Result of a form submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum SubmitOutcome {
    /// A response below 500 arrived in time.
    Success { status: u16 },
    /// The page URL changed but no response was observed.
    SubmittedNoResponse,
    /// The submission errored or returned a server error.
    Error { message: String },
}

/// An anchor observed on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRef {
    pub href: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub text: String,
}

impl LinkRef {
    /// Whether the href can be probed over the network at all.
    /// mailto:, tel:, javascript: and fragment-only anchors cannot.
    pub fn is_network_navigable(&self) -> bool {
        let href = self.href.trim();
        !(href.is_empty()
            || href.starts_with('#')
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
            || href.starts_with("javascript:"))
    }
}
