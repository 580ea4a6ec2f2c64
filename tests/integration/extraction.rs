use convenio_search::extract::{
    extract_discounts, join_categories, normalize_date, sanitize_content, Extractor,
    HeuristicExtractor,
};

#[test]
fn test_brazilian_dates_normalize() {
    for (day, month, year) in [(1, 1, 2000), (31, 12, 1999), (15, 7, 2024), (9, 10, 2030)] {
        let raw = format!("{:02}/{:02}/{}", day, month, year);
        assert_eq!(
            normalize_date(&raw),
            format!("{}-{:02}-{:02}", year, month, day)
        );
    }
}

#[test]
fn test_dates_without_three_parts_are_empty() {
    for raw in ["", "2024", "05/2024", "05/02/2024/1", "5 de fevereiro de 2024"] {
        assert_eq!(normalize_date(raw), "", "input {:?}", raw);
    }
}

#[test]
fn test_reserved_labels_never_survive() {
    let labels = [
        "  convênios ",
        "DESTAQUES",
        "Saúde",
        "Convênios",
        "destaques\t",
        "Saúde",
    ];
    assert_eq!(join_categories(&labels), "Saúde");
}

#[test]
fn test_sanitize_idempotent_on_real_page() {
    let raw = r#"<div class="entry">
        <p style="text-align: justify;">Texto	com   tabs</p>
        <!-- comentário -->
        <script type="text/javascript">var x = "<p>";</script>
        <noscript><img src="x.gif"></noscript>
        <iframe src="https://www.youtube.com/embed/x"></iframe>
        <p>Fim</p>
        <div class="clear"></div><div class="share-post">share</div>
    </div>"#;

    let once = sanitize_content(raw);
    assert_eq!(sanitize_content(&once), once);
    for forbidden in ["<script", "<style", "<iframe", "<noscript", "<!--", "style=", "share"] {
        assert!(!once.contains(forbidden), "{} left in {}", forbidden, once);
    }
}

#[test]
fn test_discount_examples() {
    assert_eq!(
        extract_discounts("<p><strong>Desconto:</strong> 10% em livros</p>"),
        "10% em livros"
    );
    assert_eq!(extract_discounts("<p>Sem benefícios listados.</p>"), "");
}

#[test]
fn test_non_detail_page_yields_nothing() {
    let extractor = HeuristicExtractor::new();
    assert!(extractor
        .extract("<html><body><h1><span>Lista</span></h1></body></html>")
        .is_none());
}
