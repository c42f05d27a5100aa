//! Cross-field validation the derive attributes cannot express.

use url::Url;
use validator::Validate;

use crate::error::ContractError;
use crate::types::{CreateJobRequest, UpdateJobRequest};

/// Check that a baseline/candidate pair is usable: both http(s) and
/// not the same location. `Url` parsing already guarantees the values
/// are absolute.
pub fn validate_url_pair(baseline: &Url, candidate: &Url) -> Result<(), ContractError> {
    for (side, url) in [("baselineUrl", baseline), ("candidateUrl", candidate)] {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ContractError::invalid_input(format!(
                "{side} must be an http(s) URL, got scheme {:?}",
                url.scheme()
            )));
        }
    }
    if baseline == candidate {
        return Err(ContractError::invalid_input(
            "baselineUrl and candidateUrl must differ",
        ));
    }
    Ok(())
}

impl CreateJobRequest {
    /// Full request validation: derive rules plus the URL pair rule.
    pub fn validate_request(&self) -> Result<(), ContractError> {
        self.validate()?;
        validate_url_pair(&self.baseline_url, &self.candidate_url)
    }
}

impl UpdateJobRequest {
    /// Validate a partial update against the job's current URLs. The
    /// pair rule applies whenever either side is touched.
    pub fn validate_request(
        &self,
        current_baseline: &Url,
        current_candidate: &Url,
    ) -> Result<(), ContractError> {
        self.validate()?;
        if self.baseline_url.is_some() || self.candidate_url.is_some() {
            let baseline = self.baseline_url.as_ref().unwrap_or(current_baseline);
            let candidate = self.candidate_url.as_ref().unwrap_or(current_candidate);
            validate_url_pair(baseline, candidate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CrawlConfig;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn create_request(baseline: &str, candidate: &str) -> CreateJobRequest {
        CreateJobRequest {
            name: "checkout migration".into(),
            description: None,
            baseline_url: url(baseline),
            candidate_url: url(candidate),
            crawl_config: None,
            page_map: Vec::new(),
            test_matrix: None,
        }
    }

    #[test]
    fn accepts_distinct_http_urls() {
        let req = create_request("https://a.test", "https://b.test");
        assert!(req.validate_request().is_ok());
    }

    #[test]
    fn rejects_equal_urls() {
        let req = create_request("https://a.test", "https://a.test");
        let err = req.validate_request().unwrap_err();
        assert!(err.message().contains("must differ"));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let req = create_request("ftp://a.test", "https://b.test");
        assert!(req.validate_request().is_err());
    }

    #[test]
    fn rejects_empty_name() {
        let mut req = create_request("https://a.test", "https://b.test");
        req.name = String::new();
        assert!(req.validate_request().is_err());
    }

    #[test]
    fn rejects_zero_max_pages() {
        let mut req = create_request("https://a.test", "https://b.test");
        req.crawl_config = Some(CrawlConfig {
            max_pages: 0,
            ..CrawlConfig::default()
        });
        assert!(req.validate_request().is_err());
    }

    #[test]
    fn update_checks_pair_against_current_values() {
        let update = UpdateJobRequest {
            candidate_url: Some(url("https://a.test")),
            ..UpdateJobRequest::default()
        };
        let err = update
            .validate_request(&url("https://a.test"), &url("https://b.test"))
            .unwrap_err();
        assert!(err.message().contains("must differ"));
    }

    #[test]
    fn update_without_urls_skips_pair_rule() {
        let update = UpdateJobRequest {
            name: Some("renamed".into()),
            ..UpdateJobRequest::default()
        };
        assert!(update
            .validate_request(&url("https://a.test"), &url("https://b.test"))
            .is_ok());
    }
}
