use regex::Regex;
use std::sync::OnceLock;

/// Three alternatives, tried leftmost-first at each position:
/// 1. `<strong>Desconto(s):</strong>` up to the closing `</p>`
/// 2. a bare `Desconto(s):` up to the closing `</p>`
/// 3. a paragraph opening with a roman numeral (I..X) followed by a line break
const DISCOUNT_PATTERN: &str = concat!(
    r"(?is)<strong>Descontos?:?\s*</strong>(.*?)</p>",
    r"|Descontos?:?\s*(.*?)</p>",
    r"|(<p>\s*(?:I|II|III|IV|V|VI|VII|VIII|IX|X)[^<]*<br\s*/?>.*?)</p>",
);

fn discount_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DISCOUNT_PATTERN).expect("discount pattern is valid"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"))
}

/// Extracts the plain-text discount clauses from a post body
///
/// Clauses are joined with `", "`; a body without discount markers gives an
/// empty string.
///
/// ```
/// use convenio_search::extract::extract_discounts;
///
/// let html = "<p><strong>Desconto:</strong> 10% em livros</p>";
/// assert_eq!(extract_discounts(html), "10% em livros");
/// ```
pub fn extract_discounts(content: &str) -> String {
    let mut clauses = Vec::new();

    for caps in discount_regex().captures_iter(content) {
        let Some(raw) = (1..=3)
            .filter_map(|i| caps.get(i))
            .map(|m| m.as_str())
            .find(|s| !s.is_empty())
        else {
            continue;
        };

        let text = tag_regex().replace_all(raw, "");
        let text = text.trim();
        if !text.is_empty() {
            clauses.push(text.to_string());
        }
    }

    clauses.join(", ")
}
