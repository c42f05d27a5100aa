//! Artifact path helpers.

use std::path::{Component, Path};

/// Sanitize a URL path into a filesystem-safe directory segment.
/// `/` becomes `-`, anything outside `[A-Za-z0-9_-]` becomes `_`,
/// consecutive separators collapse, and an empty result falls back to
/// `index` so the root path gets a stable home.
pub fn sanitize_path_segment(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    let mut out = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        let mapped = match ch {
            '/' => '-',
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => c,
            _ => '_',
        };
        let repeated = matches!(mapped, '-' | '_') && out.ends_with(mapped);
        if !repeated {
            out.push(mapped);
        }
    }
    if out.is_empty() {
        "index".to_string()
    } else {
        out
    }
}

/// Check that an artifact's registry path stays inside its run
/// directory: a plain relative path starting with `{run_id}/` and
/// containing no parent-directory escapes.
pub fn is_path_inside_run(relative_path: &str, run_id: &str) -> bool {
    if !relative_path.starts_with(&format!("{run_id}/")) {
        return false;
    }
    Path::new(relative_path)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}
