use crate::UrlError;
use url::Url;

/// Query parameters that never change which page is served
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "source"];

/// Builds the key under which a URL is remembered as visited
///
/// Two links that differ only in host case, a leading `www.`, a trailing
/// slash, the fragment, tracking parameters or query order map to the same
/// key, so pagination that links back to itself is fetched once.
///
/// ```
/// use convenio_search::url::frontier_key;
///
/// let a = frontier_key("https://WWW.Example.com/category/convenios/page/2/#top").unwrap();
/// let b = frontier_key("https://example.com/category/convenios/page/2?utm_source=x").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn frontier_key(url_str: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .ok_or(UrlError::MissingDomain)?
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(if path.is_empty() { "/" } else { &path });
    url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("utm_") && !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params);
    }

    // The scheme is left out: the site serves the same pages on both.
    Ok(url[url::Position::BeforeHost..].to_string())
}
