//! URL handling for the crawl frontier
//!
//! Provides the frontier deduplication key and the domain allow-list check
//! applied to every discovered link.

mod normalize;

pub use normalize::frontier_key;

use url::Url;

/// Extracts the lowercase host of a URL
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks if a domain matches a wildcard pattern
///
/// `"example.com"` matches only itself; `"*.example.com"` matches the bare
/// domain and any subdomain at any depth.
///
/// ```
/// use convenio_search::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "www.example.com"));
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(!matches_wildcard("example.com", "blog.example.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Returns true if the URL is http(s) and its host is covered by one of the patterns
pub fn is_allowed(url: &Url, allowed_domains: &[String]) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return false;
    }

    match extract_domain(url) {
        Some(domain) => allowed_domains
            .iter()
            .any(|pattern| matches_wildcard(pattern, &domain)),
        None => false,
    }
}
