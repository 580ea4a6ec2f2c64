//! Structural lookups against the site's markup landmarks

use scraper::{Html, Selector};

/// Umbrella labels attached to every post; they navigate, they do not classify
pub const RESERVED_CATEGORIES: [&str; 2] = ["Convênios", "Destaques"];

const TITLE_SELECTOR: &str = "h1 span";
const DATE_SELECTOR: &str = ".tie-date";
const CATEGORY_SELECTOR: &str = ".post-cats a";
const CONTENT_SELECTOR: &str = ".entry";

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;

    document
        .select(&selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn title(document: &Html) -> Option<String> {
    first_text(document, TITLE_SELECTOR)
}

pub(crate) fn date(document: &Html) -> Option<String> {
    first_text(document, DATE_SELECTOR)
}

pub(crate) fn categories(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse(CATEGORY_SELECTOR) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|element| element.text().collect::<String>())
        .collect()
}

/// Outer HTML of the post body, if the page has one
pub(crate) fn content_html(document: &Html) -> Option<String> {
    let selector = Selector::parse(CONTENT_SELECTOR).ok()?;
    document.select(&selector).next().map(|element| element.html())
}

/// Converts a `DD/MM/YYYY` date into the sortable `YYYY-MM-DD` form
///
/// Anything that does not split into exactly three numeric components
/// normalizes to an empty string. Single-digit days and months are padded.
///
/// ```
/// use convenio_search::extract::normalize_date;
///
/// assert_eq!(normalize_date("05/02/2024"), "2024-02-05");
/// assert_eq!(normalize_date("5/2/2024"), "2024-02-05");
/// assert_eq!(normalize_date("2024-02-05"), "");
/// ```
pub fn normalize_date(raw: &str) -> String {
    let parts: Vec<&str> = raw.trim().split('/').map(str::trim).collect();

    let &[day, month, year] = parts.as_slice() else {
        return String::new();
    };

    let numeric = |s: &str, max_len: usize| {
        !s.is_empty() && s.len() <= max_len && s.chars().all(|c| c.is_ascii_digit())
    };

    if !numeric(day, 2) || !numeric(month, 2) || !numeric(year, 4) || year.len() != 4 {
        return String::new();
    }

    format!("{}-{:0>2}-{:0>2}", year, month, day)
}

/// Joins category labels with `", "`, dropping blanks, repeats and reserved labels
///
/// Reserved labels are matched after trimming and without regard to case.
pub fn join_categories<S: AsRef<str>>(labels: &[S]) -> String {
    let mut kept: Vec<&str> = Vec::new();

    for label in labels {
        let label = label.as_ref().trim();
        if label.is_empty() || is_reserved(label) || kept.contains(&label) {
            continue;
        }
        kept.push(label);
    }

    kept.join(", ")
}

fn is_reserved(label: &str) -> bool {
    let label = label.to_lowercase();
    RESERVED_CATEGORIES
        .iter()
        .any(|reserved| reserved.to_lowercase() == label)
}
