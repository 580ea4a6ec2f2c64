//! Content extraction for convênio detail pages
//!
//! Extraction is pure: raw HTML in, structured fields out, no I/O. Every field
//! degrades to an empty value on its own; a page only yields nothing when it
//! is not a detail page at all.
//!
//! The regex/DOM heuristics live behind the [`Extractor`] trait so a stricter
//! DOM-query implementation can replace [`HeuristicExtractor`] without
//! touching the crawler.

mod discounts;
mod fields;
mod sanitize;

pub use discounts::extract_discounts;
pub use fields::{join_categories, normalize_date, RESERVED_CATEGORIES};
pub use sanitize::sanitize_content;

use scraper::Html;
use serde::{Deserialize, Serialize};

/// Fields scraped from one detail page
///
/// This is also the shape of each object in the intermediate JSON artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedItem {
    pub title: String,
    /// `YYYY-MM-DD` or empty
    pub date: String,
    /// Category labels joined with `", "`
    pub cats: String,
    /// Sanitized HTML of the page body
    pub content: String,
    /// Discount clauses joined with `", "`
    pub discounts: String,
}

/// Turns one fetched page into at most one item
pub trait Extractor: Send + Sync {
    /// Returns `None` when the page is not a detail page
    fn extract(&self, html: &str) -> Option<ExtractedItem>;
}

/// Extractor keyed on the landmarks of the convênio site theme
#[derive(Debug, Clone, Default)]
pub struct HeuristicExtractor;

impl HeuristicExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for HeuristicExtractor {
    fn extract(&self, html: &str) -> Option<ExtractedItem> {
        let document = Html::parse_document(html);

        // The body is the only landmark that decides whether this is a detail page
        let raw_content = fields::content_html(&document)?;

        let title = fields::title(&document).unwrap_or_default();
        let date = fields::date(&document)
            .map(|d| normalize_date(&d))
            .unwrap_or_default();
        let cats = join_categories(&fields::categories(&document));

        let discounts = extract_discounts(&raw_content);
        tracing::debug!("Discounts for '{}': {}", title, discounts);

        Some(ExtractedItem {
            title,
            date,
            cats,
            content: sanitize_content(&raw_content),
            discounts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETAIL_PAGE: &str = r#"
        <html><head><title>Livraria Central | CAA</title></head>
        <body>
          <h1 class="name post-title"><span itemprop="name">Livraria Central</span></h1>
          <p class="post-meta"><span class="tie-date">05/02/2024</span></p>
          <p class="post-cats">
            <a href="/category/convenios/">Convênios</a>
            <a href="/category/cultura/">Cultura</a>
            <a href="/category/destaques/"> Destaques </a>
            <a href="/category/educacao/">Educação</a>
          </p>
          <div class="entry">
            <p style="text-align: justify;">Rede de livrarias do DF.</p>
            <script>track("view");</script>
            <p><strong>Desconto:</strong> 10% em livros</p>
            <div class="clear"></div>
            <div class="share-post">Compartilhe</div>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_detail_page() {
        let item = HeuristicExtractor::new().extract(DETAIL_PAGE).unwrap();

        assert_eq!(item.title, "Livraria Central");
        assert_eq!(item.date, "2024-02-05");
        assert_eq!(item.cats, "Cultura, Educação");
        assert_eq!(item.discounts, "10% em livros");
        assert!(item.content.starts_with("<div class=\"entry\">"));
        assert!(!item.content.contains("<script"));
        assert!(!item.content.contains("style="));
        assert!(!item.content.contains("Compartilhe"));
        assert!(item.content.contains("Rede de livrarias do DF."));
    }

    #[test]
    fn test_listing_page_yields_nothing() {
        let html = r#"<html><body><div class="content"><div class="post-listing">
            <a class="more-link" href="/convenio/a/">Leia mais</a></div></div></body></html>"#;
        assert!(HeuristicExtractor::new().extract(html).is_none());
    }

    #[test]
    fn test_missing_fields_degrade_to_empty() {
        let html = r#"<html><body><div class="entry"><p>Texto simples</p></div></body></html>"#;
        let item = HeuristicExtractor::new().extract(html).unwrap();

        assert_eq!(item.title, "");
        assert_eq!(item.date, "");
        assert_eq!(item.cats, "");
        assert_eq!(item.discounts, "");
        assert_eq!(item.content, "<div class=\"entry\"><p>Texto simples</p></div>");
    }

    #[test]
    fn test_malformed_date_is_empty() {
        let html = r#"<html><body><span class="tie-date">fevereiro de 2024</span>
            <div class="entry"></div></body></html>"#;
        let item = HeuristicExtractor::new().extract(html).unwrap();
        assert_eq!(item.date, "");
    }

    #[test]
    fn test_item_deserializes_with_missing_fields() {
        let item: ExtractedItem = serde_json::from_str(r#"{"title": "Academia"}"#).unwrap();
        assert_eq!(item.title, "Academia");
        assert_eq!(item.cats, "");
    }
}
