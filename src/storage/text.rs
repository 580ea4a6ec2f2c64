//! Text helpers shared by the backends: accent folding, tag stripping and
//! substring highlighting.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercases and removes diacritics: `"Saúde"` becomes `"saude"`
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

fn fold_char(c: char) -> String {
    fold(c.encode_utf8(&mut [0; 4]))
}

/// Plain text of an HTML fragment with whitespace collapsed
pub fn strip_tags(html: &str) -> String {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    let tags = TAGS.get_or_init(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

    tags.replace_all(html, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wraps every accent- and case-insensitive occurrence of `terms` in `pre`/`post`
///
/// Overlapping and adjacent occurrences are merged into one marked run.
///
/// ```
/// use convenio_search::storage::text::highlight;
///
/// let terms = vec!["saude".to_string()];
/// assert_eq!(
///     highlight("Plano de Saúde", &terms, "<em>", "</em>"),
///     "Plano de <em>Saúde</em>"
/// );
/// ```
pub fn highlight(text: &str, terms: &[String], pre: &str, post: &str) -> String {
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    // folded characters, each remembering which original character produced it
    let mut folded: Vec<char> = Vec::with_capacity(chars.len());
    let mut owner: Vec<usize> = Vec::with_capacity(chars.len());
    for (i, (_, c)) in chars.iter().enumerate() {
        for f in fold_char(*c).chars() {
            folded.push(f);
            owner.push(i);
        }
    }

    let mut marked = vec![false; chars.len()];
    for term in terms {
        let needle: Vec<char> = term.chars().collect();
        if needle.is_empty() || needle.len() > folded.len() {
            continue;
        }
        for start in 0..=(folded.len() - needle.len()) {
            if folded[start..start + needle.len()] == needle[..] {
                for k in start..start + needle.len() {
                    marked[owner[k]] = true;
                }
            }
        }
    }

    if !marked.iter().any(|m| *m) {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + pre.len() + post.len());
    let mut open = false;
    for (i, (_, c)) in chars.iter().enumerate() {
        if marked[i] && !open {
            out.push_str(pre);
            open = true;
        } else if !marked[i] && open {
            out.push_str(post);
            open = false;
        }
        out.push(*c);
    }
    if open {
        out.push_str(post);
    }
    out
}
