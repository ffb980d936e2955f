//! Request classification: decides which requests the cache may answer.
//!
//! Classification is pure string matching over the method and URL. It
//! never consults the store, so a bypass decision is also a guarantee
//! that the store stays untouched for that request.

/// Routing decision for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Forward to the origin unconditionally; never read or write the store.
    Bypass,
    /// Serve from the store when possible, fall back to the origin on a miss.
    CacheFirst,
}

/// Ordered substring rules for routing requests around the cache.
///
/// Rules are evaluated in the order given and the first match wins.
/// Matching is case-sensitive substring containment against the full
/// request URL, query string included.
#[derive(Debug, Clone)]
pub struct ClassifierRules {
    bypass_patterns: Vec<String>,
}

impl ClassifierRules {
    /// Build a rule set from bypass patterns (typically `config.bypass_patterns`).
    pub fn new(bypass_patterns: Vec<String>) -> Self {
        Self { bypass_patterns }
    }

    /// Classify a request by method and absolute URL.
    ///
    /// Non-GET methods always bypass: only safe reads are cacheable, and
    /// mutations must reach the origin even when a cached body exists for
    /// the same URL. For GET, the URL is tested against each bypass
    /// pattern in order; no match means cache-first.
    pub fn classify(&self, method: &str, url: &str) -> Decision {
        if !method.eq_ignore_ascii_case("GET") {
            return Decision::Bypass;
        }

        if self.bypass_patterns.iter().any(|pattern| url.contains(pattern.as_str())) {
            return Decision::Bypass;
        }

        Decision::CacheFirst
    }

    /// The configured bypass patterns, in evaluation order.
    pub fn patterns(&self) -> &[String] {
        &self.bypass_patterns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_rules() -> ClassifierRules {
        ClassifierRules::new(vec![
            "googleapis.com".to_string(),
            "api.".to_string(),
            "/api/".to_string(),
        ])
    }

    #[test]
    fn test_classify_get_static_asset() {
        let rules = default_rules();
        assert_eq!(
            rules.classify("GET", "http://127.0.0.1:5000/static/css/style.css"),
            Decision::CacheFirst
        );
    }

    #[test]
    fn test_classify_root_document() {
        let rules = default_rules();
        assert_eq!(rules.classify("GET", "http://127.0.0.1:5000/"), Decision::CacheFirst);
    }

    #[test]
    fn test_classify_post_bypasses() {
        let rules = default_rules();
        assert_eq!(rules.classify("POST", "http://127.0.0.1:5000/"), Decision::Bypass);
    }

    #[test]
    fn test_classify_non_get_methods_bypass() {
        let rules = default_rules();
        for method in ["PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"] {
            assert_eq!(
                rules.classify(method, "http://127.0.0.1:5000/static/js/app.js"),
                Decision::Bypass,
                "{method} should bypass"
            );
        }
    }

    #[test]
    fn test_classify_method_case_insensitive() {
        let rules = default_rules();
        assert_eq!(rules.classify("get", "http://127.0.0.1:5000/"), Decision::CacheFirst);
        assert_eq!(rules.classify("Get", "http://127.0.0.1:5000/"), Decision::CacheFirst);
        assert_eq!(rules.classify("post", "http://127.0.0.1:5000/"), Decision::Bypass);
    }

    #[test]
    fn test_classify_api_path_bypasses() {
        let rules = default_rules();
        assert_eq!(
            rules.classify("GET", "http://127.0.0.1:5000/api/search?q=term"),
            Decision::Bypass
        );
    }

    #[test]
    fn test_classify_api_subdomain_bypasses() {
        let rules = default_rules();
        assert_eq!(rules.classify("GET", "https://api.example.com/v1/data"), Decision::Bypass);
    }

    #[test]
    fn test_classify_third_party_host_bypasses() {
        let rules = default_rules();
        assert_eq!(
            rules.classify("GET", "https://fonts.googleapis.com/css?family=Roboto"),
            Decision::Bypass
        );
    }

    #[test]
    fn test_classify_pattern_matches_in_query() {
        // Substring matching runs over the whole URL, query included.
        let rules = default_rules();
        assert_eq!(
            rules.classify("GET", "http://127.0.0.1:5000/docs?next=/api/tokens"),
            Decision::Bypass
        );
    }

    #[test]
    fn test_classify_empty_rules_cache_first() {
        let rules = ClassifierRules::new(vec![]);
        assert_eq!(
            rules.classify("GET", "https://api.example.com/v1/data"),
            Decision::CacheFirst
        );
        assert_eq!(rules.classify("POST", "http://127.0.0.1:5000/"), Decision::Bypass);
    }

    #[test]
    fn test_classify_deterministic() {
        let rules = default_rules();
        let first = rules.classify("GET", "http://127.0.0.1:5000/report?city=Berlin");
        for _ in 0..10 {
            assert_eq!(rules.classify("GET", "http://127.0.0.1:5000/report?city=Berlin"), first);
        }
    }

    #[test]
    fn test_classify_custom_pattern() {
        let rules = ClassifierRules::new(vec!["/report".to_string()]);
        assert_eq!(rules.classify("GET", "http://127.0.0.1:5000/report?city=Berlin"), Decision::Bypass);
        assert_eq!(rules.classify("GET", "http://127.0.0.1:5000/"), Decision::CacheFirst);
    }
}
