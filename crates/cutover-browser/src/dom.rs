//! Shared HTML inspection helpers.
//!
//! Both shipped drivers and the diff stages look at captured documents
//! through these functions so that "visible text", link and form
//! extraction mean the same thing everywhere.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{Html, Selector};
use url::Url;

use crate::types::{FormField, FormFieldKind, FormSnapshot, LinkRef};

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

fn is_hidden_style(style: &str) -> bool {
    let compact: String = style.chars().filter(|c| !c.is_whitespace()).collect();
    compact.contains("display:none") || compact.contains("visibility:hidden")
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "div"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "li"
            | "tr"
            | "br"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "table"
            | "ul"
            | "ol"
            | "nav"
            | "main"
    )
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            let piece = text.trim();
            if !piece.is_empty() {
                if !out.is_empty() && !out.ends_with('\n') && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(piece);
            }
        }
        Node::Element(element) => {
            let tag = element.name();
            if SKIPPED_TAGS.contains(&tag) {
                return;
            }
            if element.attr("style").is_some_and(is_hidden_style)
                || element.attr("hidden").is_some()
            {
                return;
            }
            for child in node.children() {
                collect_text(child, out);
            }
            if is_block_tag(tag) && !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
    }
}

/// Extract the text a user would see: the DOM walk skips `script`,
/// `style` and nodes hidden via inline style, and block elements break
/// lines.
pub fn visible_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut out = String::new();
    collect_text(doc.tree.root(), &mut out);
    let mut lines: Vec<&str> = out.lines().map(str::trim).collect();
    lines.retain(|l| !l.is_empty());
    lines.join("\n")
}

/// Extract the document title, trimmed.
pub fn title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let text: String = doc.select(&selector).next()?.text().collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extract the bounded metadata tag set: description, keywords,
/// og:title, og:description.
pub fn meta_tags(html: &str) -> std::collections::BTreeMap<String, String> {
    let doc = Html::parse_document(html);
    let mut out = std::collections::BTreeMap::new();
    let selector = Selector::parse("meta").expect("static selector");
    for meta in doc.select(&selector) {
        let key = meta
            .value()
            .attr("name")
            .or_else(|| meta.value().attr("property"));
        let (Some(key), Some(content)) = (key, meta.value().attr("content")) else {
            continue;
        };
        if matches!(key, "description" | "keywords" | "og:title" | "og:description") {
            out.insert(key.to_string(), content.trim().to_string());
        }
    }
    out
}

/// Extract anchors with their hrefs resolved against `base` when they
/// are relative. Unresolvable hrefs are kept verbatim so callers can
/// still report them.
pub fn links(html: &str, base: &Url) -> Vec<LinkRef> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("static selector");
    doc.select(&selector)
        .map(|a| {
            let raw = a.value().attr("href").unwrap_or_default();
            let href = match base.join(raw) {
                Ok(resolved)
                    if !raw.starts_with('#')
                        && !raw.starts_with("mailto:")
                        && !raw.starts_with("tel:")
                        && !raw.starts_with("javascript:") =>
                {
                    resolved.to_string()
                }
                _ => raw.to_string(),
            };
            LinkRef {
                href,
                text: a.text().collect::<String>().trim().to_string(),
            }
        })
        .collect()
}

fn field_kind(tag: &str, input_type: Option<&str>) -> FormFieldKind {
    match tag {
        "textarea" => FormFieldKind::Textarea,
        "select" => FormFieldKind::Select,
        "input" => match input_type.unwrap_or("text") {
            "email" => FormFieldKind::Email,
            "text" | "search" | "url" | "tel" => FormFieldKind::Text,
            _ => FormFieldKind::Other,
        },
        _ => FormFieldKind::Other,
    }
}

/// Extract the document's forms in document order.
pub fn forms(html: &str) -> Vec<FormSnapshot> {
    let doc = Html::parse_document(html);
    let form_selector = Selector::parse("form").expect("static selector");
    let field_selector = Selector::parse("input, textarea, select").expect("static selector");
    let option_selector = Selector::parse("option").expect("static selector");

    doc.select(&form_selector)
        .enumerate()
        .map(|(index, form)| {
            let fields = form
                .select(&field_selector)
                .filter_map(|field| {
                    let tag = field.value().name();
                    let name = field.value().attr("name")?.to_string();
                    let kind = field_kind(tag, field.value().attr("type"));
                    let options = if kind == FormFieldKind::Select {
                        field
                            .select(&option_selector)
                            .map(|o| {
                                o.value()
                                    .attr("value")
                                    .map(str::to_string)
                                    .unwrap_or_else(|| o.text().collect::<String>().trim().into())
                            })
                            .collect()
                    } else {
                        Vec::new()
                    };
                    Some(FormField { name, kind, options })
                })
                .collect();
            FormSnapshot {
                index,
                action: form.value().attr("action").map(str::to_string),
                method: form
                    .value()
                    .attr("method")
                    .unwrap_or("get")
                    .to_ascii_lowercase(),
                fields,
            }
        })
        .collect()
}
