//! Data integrity stage: compare the structured and textual content
//! that must survive a migration.

use cutover_browser::dom;
use cutover_rest_api_contract::ArtifactKind;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use tracing::debug;

use super::capture::CaptureOutput;
use super::{StageFailure, StageOutput, StageResult};
use crate::context::RunContext;

/// The fixed pricing selector set. Deliberately small; elements are
/// matched positionally per selector across the two sides.
pub const PRICING_SELECTORS: &[&str] =
    &[".price", "[class*=\"price\"]", "[data-price]", ".amount", ".cost"];

fn price_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?ix)
            (?P<cur>[$€£¥])\s*(?P<amt>[0-9][0-9,]*(?:\.[0-9]+)?)
            |
            (?P<amt2>[0-9][0-9,]*(?:\.[0-9]+)?)\s*(?P<cur2>usd|eur|gbp|jpy)",
        )
        .expect("static pricing regex")
    })
}

/// One heading with its level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// One anchor with text and href.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    pub text: String,
    pub href: String,
}

/// One table: headers plus body rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One pricing element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceData {
    pub selector: String,
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// Page-level metadata subject to comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}

/// Everything the stage extracts from one captured document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub text: String,
    pub headings: Vec<Heading>,
    pub paragraphs: Vec<String>,
    pub anchors: Vec<Anchor>,
    pub metadata: PageMetadata,
    pub tables: Vec<TableData>,
    pub prices: Vec<PriceData>,
    pub json_blocks: Vec<Value>,
}

/// Extract the comparable content of a document.
pub fn extract_content(html: &str) -> PageContent {
    let doc = Html::parse_document(html);
    let sel = |s: &str| Selector::parse(s).expect("static selector");

    let mut headings = Vec::new();
    for level in 1..=6u8 {
        let selector = sel(&format!("h{level}"));
        for el in doc.select(&selector) {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                headings.push(Heading { level, text });
            }
        }
    }

    let paragraphs = doc
        .select(&sel("p"))
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let anchors = doc
        .select(&sel("a[href]"))
        .map(|a| Anchor {
            text: a.text().collect::<String>().trim().to_string(),
            href: a.value().attr("href").unwrap_or_default().to_string(),
        })
        .collect();

    let meta = dom::meta_tags(html);
    let metadata = PageMetadata {
        title: dom::title(html),
        description: meta.get("description").cloned(),
        keywords: meta.get("keywords").cloned(),
    };

    let mut tables = Vec::new();
    let row_sel = sel("tr");
    let cell_sel = sel("th, td");
    for table in doc.select(&sel("table")) {
        let mut rows: Vec<Vec<String>> = table
            .select(&row_sel)
            .map(|row| {
                row.select(&cell_sel)
                    .map(|cell| cell.text().collect::<String>().trim().to_string())
                    .collect()
            })
            .filter(|cells: &Vec<String>| !cells.is_empty())
            .collect();
        if rows.is_empty() {
            continue;
        }
        // First `thead tr` (or the first row) is the header.
        let headers = rows.remove(0);
        tables.push(TableData { headers, rows });
    }

    let mut prices = Vec::new();
    for selector in PRICING_SELECTORS {
        for (i, el) in doc.select(&sel(selector)).enumerate() {
            let raw = el.text().collect::<String>().trim().to_string();
            let (amount, currency) = parse_price(&raw);
            prices.push(PriceData {
                selector: format!("{selector}[{i}]"),
                raw,
                amount,
                currency,
            });
        }
    }

    let json_blocks = doc
        .select(&sel(r#"script[type="application/ld+json"]"#))
        .filter_map(|script| {
            let text: String = script.text().collect();
            serde_json::from_str(&text).ok()
        })
        .collect();

    PageContent {
        text: dom::visible_text(html),
        headings,
        paragraphs,
        anchors,
        metadata,
        tables,
        prices,
        json_blocks,
    }
}

/// Pull `(amount, currency)` from a pricing element's text.
pub fn parse_price(raw: &str) -> (Option<f64>, Option<String>) {
    let Some(caps) = price_regex().captures(raw) else {
        return (None, None);
    };
    let amount = caps
        .name("amt")
        .or_else(|| caps.name("amt2"))
        .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok());
    let currency = caps
        .name("cur")
        .or_else(|| caps.name("cur2"))
        .map(|m| m.as_str().to_uppercase());
    (amount, currency)
}

/// Status of one compared field or cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Match,
    Mismatch,
    MissingBaseline,
    MissingCandidate,
    Changed,
}

/// One field-level difference. `match` entries are implicit; only
/// exceptions are recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDiff {
    pub field: String,
    pub status: DiffStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<String>,
}

impl FieldDiff {
    fn new(field: String, status: DiffStatus, baseline: Option<String>, candidate: Option<String>) -> Self {
        Self {
            field,
            status,
            baseline,
            candidate,
        }
    }
}

/// One sentence that moved or changed at a given position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceChange {
    pub position: usize,
    pub baseline: String,
    pub candidate: String,
}

/// Text comparison result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextComparison {
    pub similarity: f64,
    pub added_tokens: Vec<String>,
    pub removed_tokens: Vec<String>,
    pub changed_sentences: Vec<SentenceChange>,
}

/// Per-page verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageDataStatus {
    Match,
    Partial,
    Mismatch,
}

/// Full comparison result for one matched page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDataResult {
    pub baseline_path: String,
    pub candidate_path: String,
    pub status: PageDataStatus,
    pub text: TextComparison,
    pub table_diffs: Vec<FieldDiff>,
    pub pricing_diffs: Vec<FieldDiff>,
    pub json_diffs: Vec<FieldDiff>,
    pub metadata_diffs: Vec<FieldDiff>,
}

/// Run-level data summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSummary {
    pub pages: usize,
    pub pages_with_mismatches: usize,
    pub missing_data_pages: usize,
    pub total_field_diffs: usize,
    pub critical_mismatches: usize,
}

/// The stage's value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStageOutput {
    pub summary: DataSummary,
    pub pages: Vec<PageDataResult>,
}

/// Compare captured content on every matched page.
pub async fn run(ctx: &RunContext, capture: &CaptureOutput) -> StageResult<DataStageOutput> {
    let mut batch = ctx.batch();
    let mut pages = Vec::new();

    for captured in &capture.pages {
        let baseline = extract_content(&captured.baseline.html);
        let candidate = extract_content(&captured.candidate.html);
        pages.push(compare_page(
            &captured.page.baseline.path,
            &captured.page.candidate.path,
            &baseline,
            &candidate,
        ));
    }

    let summary = summarize(&pages);
    let output = DataStageOutput { summary, pages };
    if let Err(e) = batch.write_json(
        "data-results.json",
        &output,
        ArtifactKind::Other,
        "Data integrity results",
    ) {
        return Err(StageFailure::with_artifacts(
            format!("cannot write data results: {e}"),
            batch.take_entries(),
        ));
    }

    debug!(run_id = %ctx.run_id, pages = output.pages.len(), "data integrity finished");
    Ok(StageOutput {
        artifacts: batch.take_entries(),
        value: output,
    })
}

/// Compare one page pair.
pub fn compare_page(
    baseline_path: &str,
    candidate_path: &str,
    baseline: &PageContent,
    candidate: &PageContent,
) -> PageDataResult {
    let text = compare_text(&baseline.text, &candidate.text);
    let table_diffs = compare_tables(&baseline.tables, &candidate.tables);
    let pricing_diffs = compare_prices(&baseline.prices, &candidate.prices);
    let json_diffs = compare_json_blocks(&baseline.json_blocks, &candidate.json_blocks);
    let metadata_diffs = compare_metadata(&baseline.metadata, &candidate.metadata);

    let structured_clean = table_diffs.is_empty()
        && pricing_diffs.is_empty()
        && json_diffs.is_empty()
        && metadata_diffs.is_empty();
    let status = if text.similarity > 0.9 && structured_clean {
        PageDataStatus::Match
    } else if text.similarity > 0.5 && table_diffs.is_empty() && pricing_diffs.is_empty() {
        PageDataStatus::Partial
    } else {
        PageDataStatus::Mismatch
    };

    PageDataResult {
        baseline_path: baseline_path.to_string(),
        candidate_path: candidate_path.to_string(),
        status,
        text,
        table_diffs,
        pricing_diffs,
        json_diffs,
        metadata_diffs,
    }
}

fn tokenize(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity over lowercase word sets plus token- and
/// sentence-level change listings.
pub fn compare_text(baseline: &str, candidate: &str) -> TextComparison {
    let b_tokens = tokenize(baseline);
    let c_tokens = tokenize(candidate);

    let intersection = b_tokens.intersection(&c_tokens).count();
    let union = b_tokens.union(&c_tokens).count();
    let similarity = if union == 0 {
        1.0
    } else {
        intersection as f64 / union as f64
    };

    let b_sentences = sentences(baseline);
    let c_sentences = sentences(candidate);
    let changed_sentences = b_sentences
        .iter()
        .zip(&c_sentences)
        .enumerate()
        .filter(|(_, (b, c))| b != c)
        .map(|(position, (b, c))| SentenceChange {
            position,
            baseline: b.clone(),
            candidate: c.clone(),
        })
        .collect();

    TextComparison {
        similarity,
        added_tokens: c_tokens.difference(&b_tokens).cloned().collect(),
        removed_tokens: b_tokens.difference(&c_tokens).cloned().collect(),
        changed_sentences,
    }
}

/// Positional table comparison with per-cell statuses; size mismatches
/// are flagged at header level.
pub fn compare_tables(baseline: &[TableData], candidate: &[TableData]) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();
    for i in 0..baseline.len().max(candidate.len()) {
        let field = format!("table[{i}]");
        match (baseline.get(i), candidate.get(i)) {
            (Some(b), None) => diffs.push(FieldDiff::new(
                field,
                DiffStatus::MissingCandidate,
                Some(format!("{} rows", b.rows.len())),
                None,
            )),
            (None, Some(c)) => diffs.push(FieldDiff::new(
                field,
                DiffStatus::MissingBaseline,
                None,
                Some(format!("{} rows", c.rows.len())),
            )),
            (Some(b), Some(c)) => {
                if b.headers.len() != c.headers.len() || b.rows.len() != c.rows.len() {
                    diffs.push(FieldDiff::new(
                        field.clone(),
                        DiffStatus::Mismatch,
                        Some(format!("{}x{}", b.rows.len(), b.headers.len())),
                        Some(format!("{}x{}", c.rows.len(), c.headers.len())),
                    ));
                }
                for (j, (bh, ch)) in b.headers.iter().zip(&c.headers).enumerate() {
                    if bh != ch {
                        diffs.push(FieldDiff::new(
                            format!("{field}.header[{j}]"),
                            DiffStatus::Changed,
                            Some(bh.clone()),
                            Some(ch.clone()),
                        ));
                    }
                }
                for (r, (brow, crow)) in b.rows.iter().zip(&c.rows).enumerate() {
                    for col in 0..brow.len().max(crow.len()) {
                        let cell = format!("{field}.row[{r}][{col}]");
                        match (brow.get(col), crow.get(col)) {
                            (Some(bv), Some(cv)) if bv != cv => diffs.push(FieldDiff::new(
                                cell,
                                DiffStatus::Changed,
                                Some(bv.clone()),
                                Some(cv.clone()),
                            )),
                            (Some(bv), None) => diffs.push(FieldDiff::new(
                                cell,
                                DiffStatus::MissingCandidate,
                                Some(bv.clone()),
                                None,
                            )),
                            (None, Some(cv)) => diffs.push(FieldDiff::new(
                                cell,
                                DiffStatus::MissingBaseline,
                                None,
                                Some(cv.clone()),
                            )),
                            _ => {}
                        }
                    }
                }
            }
            (None, None) => unreachable!(),
        }
    }
    diffs
}

/// Pricing comparison keyed by selector; amount and currency compared
/// independently.
pub fn compare_prices(baseline: &[PriceData], candidate: &[PriceData]) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();
    for b in baseline {
        let Some(c) = candidate.iter().find(|c| c.selector == b.selector) else {
            diffs.push(FieldDiff::new(
                format!("price.{}", b.selector),
                DiffStatus::MissingCandidate,
                Some(b.raw.clone()),
                None,
            ));
            continue;
        };
        if b.amount != c.amount {
            diffs.push(FieldDiff::new(
                format!("price.{}.amount", b.selector),
                DiffStatus::Changed,
                b.amount.map(|a| a.to_string()),
                c.amount.map(|a| a.to_string()),
            ));
        }
        if b.currency != c.currency {
            diffs.push(FieldDiff::new(
                format!("price.{}.currency", b.selector),
                DiffStatus::Changed,
                b.currency.clone(),
                c.currency.clone(),
            ));
        }
    }
    for c in candidate {
        if !baseline.iter().any(|b| b.selector == c.selector) {
            diffs.push(FieldDiff::new(
                format!("price.{}", c.selector),
                DiffStatus::MissingBaseline,
                None,
                Some(c.raw.clone()),
            ));
        }
    }
    diffs
}

/// Positional comparison of `ld+json` payloads via recursive deep
/// diff.
pub fn compare_json_blocks(baseline: &[Value], candidate: &[Value]) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();
    for i in 0..baseline.len().max(candidate.len()) {
        let prefix = format!("json[{i}]");
        match (baseline.get(i), candidate.get(i)) {
            (Some(b), Some(c)) => diff_json(&prefix, b, c, &mut diffs),
            (Some(b), None) => diffs.push(FieldDiff::new(
                prefix,
                DiffStatus::MissingCandidate,
                Some(short_value(b)),
                None,
            )),
            (None, Some(c)) => diffs.push(FieldDiff::new(
                prefix,
                DiffStatus::MissingBaseline,
                None,
                Some(short_value(c)),
            )),
            (None, None) => unreachable!(),
        }
    }
    diffs
}

fn short_value(value: &Value) -> String {
    let mut s = value.to_string();
    if s.len() > 120 {
        s.truncate(117);
        s.push_str("...");
    }
    s
}

fn diff_json(path: &str, baseline: &Value, candidate: &Value, out: &mut Vec<FieldDiff>) {
    match (baseline, candidate) {
        (Value::Object(b), Value::Object(c)) => {
            let keys: BTreeSet<&String> = b.keys().chain(c.keys()).collect();
            for key in keys {
                let child = format!("{path}.{key}");
                match (b.get(key.as_str()), c.get(key.as_str())) {
                    (Some(bv), Some(cv)) => diff_json(&child, bv, cv, out),
                    (Some(bv), None) => out.push(FieldDiff::new(
                        child,
                        DiffStatus::MissingCandidate,
                        Some(short_value(bv)),
                        None,
                    )),
                    (None, Some(cv)) => out.push(FieldDiff::new(
                        child,
                        DiffStatus::MissingBaseline,
                        None,
                        Some(short_value(cv)),
                    )),
                    (None, None) => {}
                }
            }
        }
        (Value::Array(b), Value::Array(c)) => {
            for i in 0..b.len().max(c.len()) {
                let child = format!("{path}[{i}]");
                match (b.get(i), c.get(i)) {
                    (Some(bv), Some(cv)) => diff_json(&child, bv, cv, out),
                    (Some(bv), None) => out.push(FieldDiff::new(
                        child,
                        DiffStatus::MissingCandidate,
                        Some(short_value(bv)),
                        None,
                    )),
                    (None, Some(cv)) => out.push(FieldDiff::new(
                        child,
                        DiffStatus::MissingBaseline,
                        None,
                        Some(short_value(cv)),
                    )),
                    (None, None) => {}
                }
            }
        }
        (b, c) if json_kind(b) != json_kind(c) => out.push(FieldDiff::new(
            path.to_string(),
            DiffStatus::Mismatch,
            Some(short_value(b)),
            Some(short_value(c)),
        )),
        (b, c) if b != c => out.push(FieldDiff::new(
            path.to_string(),
            DiffStatus::Changed,
            Some(short_value(b)),
            Some(short_value(c)),
        )),
        _ => {}
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn compare_metadata(baseline: &PageMetadata, candidate: &PageMetadata) -> Vec<FieldDiff> {
    let mut diffs = Vec::new();
    for (field, b, c) in [
        ("metadata.title", &baseline.title, &candidate.title),
        ("metadata.description", &baseline.description, &candidate.description),
        ("metadata.keywords", &baseline.keywords, &candidate.keywords),
    ] {
        match (b, c) {
            (Some(bv), Some(cv)) if bv != cv => diffs.push(FieldDiff::new(
                field.to_string(),
                DiffStatus::Changed,
                Some(bv.clone()),
                Some(cv.clone()),
            )),
            (Some(bv), None) => diffs.push(FieldDiff::new(
                field.to_string(),
                DiffStatus::MissingCandidate,
                Some(bv.clone()),
                None,
            )),
            (None, Some(cv)) => diffs.push(FieldDiff::new(
                field.to_string(),
                DiffStatus::MissingBaseline,
                None,
                Some(cv.clone()),
            )),
            _ => {}
        }
    }
    diffs
}

fn summarize(pages: &[PageDataResult]) -> DataSummary {
    let mut summary = DataSummary {
        pages: pages.len(),
        ..DataSummary::default()
    };
    for page in pages {
        if page.status == PageDataStatus::Mismatch {
            summary.pages_with_mismatches += 1;
        }
        if page.text.similarity < 0.1 && !page.text.removed_tokens.is_empty() {
            summary.missing_data_pages += 1;
        }
        summary.total_field_diffs += page.table_diffs.len()
            + page.pricing_diffs.len()
            + page.json_diffs.len()
            + page.metadata_diffs.len();
        // Pricing drift is always critical.
        summary.critical_mismatches += page.pricing_diffs.len();
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICED: &str = r#"
        <html><head><title>Plans</title></head><body>
        <h1>Plans</h1>
        <p>Pick a plan.</p>
        <span class="price">$19.99/mo</span>
        <table>
          <tr><th>Plan</th><th>Price</th></tr>
          <tr><td>Starter</td><td>$19.99</td></tr>
        </table>
        <script type="application/ld+json">{"@type":"Product","name":"Starter","offers":{"price":"19.99"}}</script>
        </body></html>"#;

    #[test]
    fn extraction_covers_every_channel() {
        let content = extract_content(PRICED);
        assert_eq!(content.headings, vec![Heading { level: 1, text: "Plans".into() }]);
        assert_eq!(content.paragraphs, vec!["Pick a plan."]);
        assert_eq!(content.metadata.title.as_deref(), Some("Plans"));
        assert_eq!(content.tables.len(), 1);
        assert_eq!(content.tables[0].headers, vec!["Plan", "Price"]);
        assert_eq!(content.tables[0].rows, vec![vec!["Starter", "$19.99"]]);
        assert_eq!(content.json_blocks.len(), 1);

        let price = content.prices.iter().find(|p| p.selector == ".price[0]").unwrap();
        assert_eq!(price.amount, Some(19.99));
        assert_eq!(price.currency.as_deref(), Some("$"));
    }

    #[test]
    fn price_parsing_handles_both_orders() {
        assert_eq!(parse_price("$1,299.00"), (Some(1299.0), Some("$".into())));
        assert_eq!(parse_price("49 EUR"), (Some(49.0), Some("EUR".into())));
        assert_eq!(parse_price("free"), (None, None));
    }

    #[test]
    fn identical_text_is_fully_similar() {
        let cmp = compare_text("Hello migration world.", "Hello migration world.");
        assert_eq!(cmp.similarity, 1.0);
        assert!(cmp.added_tokens.is_empty());
        assert!(cmp.changed_sentences.is_empty());
    }

    #[test]
    fn token_and_sentence_changes_are_reported() {
        let cmp = compare_text("The old price. Contact us.", "The new price. Contact us.");
        assert!(cmp.similarity < 1.0);
        assert_eq!(cmp.added_tokens, vec!["new"]);
        assert_eq!(cmp.removed_tokens, vec!["old"]);
        assert_eq!(cmp.changed_sentences.len(), 1);
        assert_eq!(cmp.changed_sentences[0].position, 0);
    }

    #[test]
    fn table_size_mismatch_flags_header_level() {
        let b = vec![TableData {
            headers: vec!["A".into(), "B".into()],
            rows: vec![vec!["1".into(), "2".into()]],
        }];
        let c = vec![TableData {
            headers: vec!["A".into()],
            rows: vec![vec!["1".into()]],
        }];
        let diffs = compare_tables(&b, &c);
        assert!(diffs.iter().any(|d| d.field == "table[0]" && d.status == DiffStatus::Mismatch));
        assert!(diffs
            .iter()
            .any(|d| d.field == "table[0].row[0][1]" && d.status == DiffStatus::MissingCandidate));
    }

    #[test]
    fn json_diff_distinguishes_changed_and_mismatch() {
        let b: Value = serde_json::json!({"price": "19.99", "sku": 1, "tags": ["a"]});
        let c: Value = serde_json::json!({"price": "24.99", "sku": "1", "tags": ["a", "b"]});
        let mut diffs = Vec::new();
        diff_json("json[0]", &b, &c, &mut diffs);

        let price = diffs.iter().find(|d| d.field == "json[0].price").unwrap();
        assert_eq!(price.status, DiffStatus::Changed);
        let sku = diffs.iter().find(|d| d.field == "json[0].sku").unwrap();
        assert_eq!(sku.status, DiffStatus::Mismatch);
        let tag = diffs.iter().find(|d| d.field == "json[0].tags[1]").unwrap();
        assert_eq!(tag.status, DiffStatus::MissingBaseline);
    }

    #[test]
    fn page_status_thresholds() {
        let base = extract_content(PRICED);
        let same = compare_page("/plans", "/plans", &base, &base);
        assert_eq!(same.status, PageDataStatus::Match);

        let mut changed_html = PRICED.replace("$19.99/mo", "$24.99/mo");
        changed_html = changed_html.replace("<td>$19.99</td>", "<td>$24.99</td>");
        let changed = extract_content(&changed_html);
        let result = compare_page("/plans", "/plans", &base, &changed);
        // Pricing and table diffs push the page out of partial.
        assert_eq!(result.status, PageDataStatus::Mismatch);
        assert!(!result.pricing_diffs.is_empty());
        assert!(!result.table_diffs.is_empty());
    }
}
