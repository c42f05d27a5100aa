//! URL normalization for dedupe and matching.

use url::Url;

/// Canonical form of a URL for frontier dedupe and path matching:
/// fragment and query dropped, trailing slash collapsed (the bare root
/// keeps its `/`). Hosts are already lowercased by `Url` parsing.
pub fn normalize_url(url: &Url) -> Url {
    let mut out = url.clone();
    out.set_fragment(None);
    out.set_query(None);
    let path = out.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/').to_string();
        out.set_path(if trimmed.is_empty() { "/" } else { &trimmed });
    }
    out
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme() && a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}
