use regex::Regex;
use std::sync::OnceLock;

struct Rules {
    footer: Regex,
    blocks: Regex,
    comments: Regex,
    tabs: Regex,
    newlines: Regex,
    spaces: Regex,
    inline_styles: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        footer: Regex::new(r#"(?s)<div\b[^>]*\bclass="clear"[^>]*>.*"#)
            .expect("footer pattern is valid"),
        blocks: Regex::new(concat!(
            r"(?is)<script[^>]*>.*?</script>",
            r"|<style[^>]*>.*?</style>",
            r"|<iframe[^>]*>.*?</iframe>",
            r"|<noscript[^>]*>.*?</noscript>",
        ))
        .expect("block pattern is valid"),
        comments: Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"),
        tabs: Regex::new(r"\t+").expect("tab pattern is valid"),
        newlines: Regex::new(r"\n+").expect("newline pattern is valid"),
        spaces: Regex::new(r"\s{2,}").expect("space pattern is valid"),
        inline_styles: Regex::new(r#"\s*style="[^"]*""#).expect("style pattern is valid"),
    })
}

/// Cleans a post body for display
///
/// Steps, each applied to the previous output:
/// 1. drop everything from the theme's `<div class="clear">` footer onward,
///    whatever other attributes the div carries
/// 2. remove `<script>`, `<style>`, `<iframe>` and `<noscript>` blocks
/// 3. remove HTML comments
/// 4. collapse tab runs, then newline runs, then any 2+ whitespace run to one space
/// 5. remove inline `style="..."` attributes
/// 6. trim
///
/// Styles are stripped from the already-cleaned text, so a `style=` inside a
/// removed block never influences the result. The function is idempotent.
pub fn sanitize_content(content: &str) -> String {
    let rules = rules();

    let text = rules.footer.replace(content, "</div>");
    let text = rules.blocks.replace_all(&text, "");
    let text = rules.comments.replace_all(&text, "");
    let text = rules.tabs.replace_all(&text, " ");
    let text = rules.newlines.replace_all(&text, " ");
    let text = rules.spaces.replace_all(&text, " ");
    let text = rules.inline_styles.replace_all(&text, "");

    text.trim().to_string()
}
