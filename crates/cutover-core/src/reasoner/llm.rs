//! LLM-backed reasoner.
//!
//! Builds a prompt from the stage summaries, requests a JSON-object
//! response at low temperature, and parses it leniently by extracting
//! the first balanced JSON object from the completion text. Any
//! failure bubbles up so the orchestrator can fall back to the
//! rule-based reasoner.

use async_trait::async_trait;
use cutover_rest_api_contract::Severity;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{CategoryAnalysis, MigrationAnalysis, OverallAnalysis, Reasoner, ReasoningInput};
use crate::error::{Error, Result};

const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 2048;

/// Connection settings, usually read from `LLM_ENDPOINT`,
/// `LLM_API_KEY` and `LLM_DEPLOYMENT_NAME`.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
}

/// Reasoner calling a chat-completion style endpoint.
pub struct LlmReasoner {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmReasoner {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::transient("Reasoning", format!("cannot build LLM client: {e}")))?;
        Ok(Self { config, client })
    }

    fn build_prompt(input: &ReasoningInput) -> String {
        let summary = serde_json::to_string_pretty(input).unwrap_or_else(|_| "{}".into());
        format!(
            "You are reviewing evidence from a website migration comparison.\n\
             Baseline is the production site, candidate is the migrated site.\n\
             Stage summaries (a missing key means that stage was unavailable):\n\
             {summary}\n\n\
             Classify each category (visual, functional, data) and the overall\n\
             migration. Filter likely false positives (anti-aliasing, timestamps,\n\
             ad rotations) and note genuinely expected changes. Respond with a\n\
             single JSON object of the form:\n\
             {{\"categories\":[{{\"category\":\"visual\",\"severity\":\"none|low|medium|high|critical\",\
             \"confidence\":0.0,\"pass\":true,\"explanation\":\"...\",\"keyFindings\":[],\
             \"falsePositives\":[],\"expectedChanges\":[]}}],\
             \"overall\":{{\"severity\":\"none\",\"confidence\":0.0,\"pass\":true,\
             \"explanation\":\"...\",\"recommendations\":[]}}}}"
        )
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// The document shape we accept back, with lenient defaults.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmAnalysisDoc {
    #[serde(default)]
    categories: Vec<LlmCategoryDoc>,
    overall: LlmOverallDoc,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmCategoryDoc {
    category: String,
    severity: Severity,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    pass: bool,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    key_findings: Vec<String>,
    #[serde(default)]
    false_positives: Vec<String>,
    #[serde(default)]
    expected_changes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlmOverallDoc {
    severity: Severity,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    pass: bool,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// Extract the first balanced JSON object from free-form completion
/// text, tolerating prose or code fences around it.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn analyze(&self, input: &ReasoningInput) -> Result<MigrationAnalysis> {
        let prompt = Self::build_prompt(input);
        let body = ChatRequest {
            model: &self.config.deployment,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat { kind: "json_object" },
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::transient("Reasoning", format!("LLM request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::transient(
                "Reasoning",
                format!("LLM returned {status}: {text}"),
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::transient("Reasoning", format!("unparseable LLM response: {e}")))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| Error::transient("Reasoning", "LLM response has no choices"))?;

        let object = extract_json_object(content)
            .ok_or_else(|| Error::transient("Reasoning", "no JSON object in LLM response"))?;
        let doc: LlmAnalysisDoc = serde_json::from_str(object)
            .map_err(|e| Error::transient("Reasoning", format!("invalid analysis JSON: {e}")))?;

        debug!(categories = doc.categories.len(), "LLM analysis parsed");
        Ok(MigrationAnalysis {
            categories: doc
                .categories
                .into_iter()
                .map(|c| CategoryAnalysis {
                    category: c.category,
                    severity: c.severity,
                    confidence: c.confidence.clamp(0.0, 1.0),
                    pass: c.pass,
                    explanation: c.explanation,
                    key_findings: c.key_findings,
                    false_positives: c.false_positives,
                    expected_changes: c.expected_changes,
                })
                .collect(),
            overall: OverallAnalysis {
                severity: doc.overall.severity,
                confidence: doc.overall.confidence.clamp(0.0, 1.0),
                pass: doc.overall.pass,
                explanation: doc.overall.explanation,
                recommendations: doc.overall.recommendations,
            },
        })
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}
