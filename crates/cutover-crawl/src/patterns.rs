//! Include/exclude path filtering.
//!
//! Patterns are glob-style over URL paths where `*` matches any
//! substring; a pattern without `*` must equal the path exactly.
//! Include patterns, when present, form an allow-list; exclude
//! patterns always win.

/// Compiled include/exclude filter over URL paths.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PathFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: include.to_vec(),
            exclude: exclude.to_vec(),
        }
    }

    /// Whether a normalized path passes the filter.
    pub fn allows(&self, path: &str) -> bool {
        if self.exclude.iter().any(|p| pattern_matches(p, path)) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|p| pattern_matches(p, path))
    }
}

/// Match one pattern against a path. `*` matches any substring,
/// including the empty one.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == path;
    }

    let mut rest = path;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match rest.find(part) {
            // The first literal must sit at the start unless the
            // pattern opened with `*`; the last must end the path
            // unless it closed with one.
            Some(pos) => {
                if i == 0 && pos != 0 {
                    return false;
                }
                rest = &rest[pos + part.len()..];
            }
            None => return false,
        }
    }
    if let Some(last) = parts.last() {
        if !last.is_empty() && !path.ends_with(last) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_patterns_match_exactly() {
        assert!(pattern_matches("/about", "/about"));
        assert!(!pattern_matches("/about", "/about/team"));
    }

    #[test]
    fn star_matches_any_substring() {
        assert!(pattern_matches("/blog/*", "/blog/post-1"));
        assert!(pattern_matches("/blog/*", "/blog/"));
        assert!(pattern_matches("*/edit", "/items/3/edit"));
        assert!(pattern_matches("*admin*", "/x/admin/panel"));
        assert!(!pattern_matches("/blog/*", "/docs/blog"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let filter = PathFilter::new(
            &["/docs/*".to_string()],
            &["*draft*".to_string()],
        );
        assert!(filter.allows("/docs/intro"));
        assert!(!filter.allows("/docs/draft-2"));
        assert!(!filter.allows("/pricing"));
    }

    #[test]
    fn empty_include_allows_everything_not_excluded() {
        let filter = PathFilter::new(&[], &["/private".to_string()]);
        assert!(filter.allows("/anything"));
        assert!(!filter.allows("/private"));
    }
}
