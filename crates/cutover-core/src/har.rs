//! HAR 1.2 document shapes for the functional stage.

use chrono::{DateTime, Utc};
use cutover_browser::NetworkEvent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Har {
    pub log: HarLog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarLog {
    pub version: String,
    pub creator: HarCreator,
    pub pages: Vec<HarPage>,
    pub entries: Vec<HarEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarCreator {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPage {
    pub started_date_time: DateTime<Utc>,
    pub id: String,
    pub title: String,
    pub page_timings: HarPageTimings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarPageTimings {
    pub on_content_load: i64,
    pub on_load: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarEntry {
    pub started_date_time: DateTime<Utc>,
    pub time: i64,
    pub request: HarRequest,
    pub response: HarResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarRequest {
    pub method: String,
    pub url: String,
    pub http_version: String,
    pub headers: Vec<HarHeader>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarResponse {
    pub status: u16,
    pub status_text: String,
    pub http_version: String,
    pub headers: Vec<HarHeader>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarHeader {
    pub name: String,
    pub value: String,
}

impl Har {
    /// Build a HAR document from one page's observed traffic.
    pub fn from_events(page_url: &str, load_time_ms: u64, events: &[NetworkEvent]) -> Self {
        let started = events
            .first()
            .map(|e| e.request.timestamp)
            .unwrap_or_else(Utc::now);
        let entries = events
            .iter()
            .map(|event| HarEntry {
                started_date_time: event.request.timestamp,
                time: event
                    .response
                    .as_ref()
                    .map(|r| (r.timestamp - event.request.timestamp).num_milliseconds().max(0))
                    .unwrap_or(-1),
                request: HarRequest {
                    method: event.request.method.clone(),
                    url: event.request.url.clone(),
                    http_version: "HTTP/1.1".into(),
                    headers: Vec::new(),
                },
                response: match &event.response {
                    Some(response) => HarResponse {
                        status: response.status,
                        status_text: response.status_text.clone(),
                        http_version: "HTTP/1.1".into(),
                        headers: response
                            .headers
                            .iter()
                            .map(|(name, value)| HarHeader {
                                name: name.clone(),
                                value: value.clone(),
                            })
                            .collect(),
                    },
                    None => HarResponse {
                        status: 0,
                        status_text: String::new(),
                        http_version: "HTTP/1.1".into(),
                        headers: Vec::new(),
                    },
                },
                comment: event.failure.clone(),
            })
            .collect();

        Self {
            log: HarLog {
                version: "1.2".into(),
                creator: HarCreator {
                    name: "cutover".into(),
                    version: env!("CARGO_PKG_VERSION").into(),
                },
                pages: vec![HarPage {
                    started_date_time: started,
                    id: "page_1".into(),
                    title: page_url.to_string(),
                    page_timings: HarPageTimings {
                        on_content_load: -1,
                        on_load: load_time_ms as i64,
                    },
                }],
                entries,
            },
        }
    }

    /// The minimal valid document emitted when rich capture fails.
    pub fn minimal(page_url: &str) -> Self {
        Self::from_events(page_url, 0, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutover_browser::{NetworkRequest, NetworkResponse};

    #[test]
    fn minimal_har_is_valid_shape() {
        let har = Har::minimal("https://a.test/");
        assert_eq!(har.log.version, "1.2");
        assert!(har.log.entries.is_empty());
        assert_eq!(har.log.pages.len(), 1);

        let json = serde_json::to_value(&har).unwrap();
        assert!(json["log"]["pages"][0]["pageTimings"]["onLoad"].is_i64());
    }

    #[test]
    fn events_become_entries_with_failures_as_comments() {
        let now = Utc::now();
        let events = vec![NetworkEvent {
            request: NetworkRequest {
                url: "https://a.test/app.js".into(),
                method: "GET".into(),
                timestamp: now,
            },
            response: Some(NetworkResponse {
                status: 200,
                status_text: "OK".into(),
                headers: Default::default(),
                timestamp: now,
            }),
            failure: None,
        }];
        let har = Har::from_events("https://a.test/", 120, &events);
        assert_eq!(har.log.entries.len(), 1);
        assert_eq!(har.log.entries[0].response.status, 200);
    }
}
