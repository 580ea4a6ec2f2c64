//! Link discovery on listing pages
//!
//! A listing page links to detail pages through its "read more" anchors and
//! to further listing pages through its pagination bar. Nothing else on the
//! page is followed.

use scraper::{Html, Selector};
use url::Url;

const DETAIL_LINK_SELECTOR: &str = ".content .post-listing .more-link";
const PAGE_LINK_SELECTOR: &str = ".pagination a";

/// Links found on one listing page, resolved to absolute URLs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingLinks {
    /// Detail pages to extract
    pub detail_links: Vec<Url>,

    /// Further listing pages to scan for links
    pub page_links: Vec<Url>,
}

/// Parses a listing page and collects its detail and pagination links
///
/// # Example
///
/// ```
/// use convenio_search::crawler::parse_listing;
/// use url::Url;
///
/// let html = r#"<div class="content"><div class="post-listing">
///     <a class="more-link" href="/otica-visao/">Leia mais</a>
/// </div></div>
/// <div class="pagination"><a href="/page/2/">2</a></div>"#;
/// let base_url = Url::parse("https://example.com/category/convenios/").unwrap();
/// let links = parse_listing(html, &base_url);
/// assert_eq!(links.detail_links[0].as_str(), "https://example.com/otica-visao/");
/// assert_eq!(links.page_links[0].as_str(), "https://example.com/page/2/");
/// ```
pub fn parse_listing(html: &str, base_url: &Url) -> ListingLinks {
    let document = Html::parse_document(html);

    ListingLinks {
        detail_links: select_links(&document, DETAIL_LINK_SELECTOR, base_url),
        page_links: select_links(&document, PAGE_LINK_SELECTOR, base_url),
    }
}

fn select_links(document: &Html, selector: &str, base_url: &Url) -> Vec<Url> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only anchors
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url),
        _ => None,
    }
}
