use convenio_search::config::{load_config, SearchConfig};
use convenio_search::crawler::{
    CrawlEvent, CrawlSettings, JobCoordinator, JobError, JobPhase, ProgressEmitter,
    ReqwestFetcher,
};
use convenio_search::extract::HeuristicExtractor;
use convenio_search::query::{ListParams, QueryEngine};
use convenio_search::storage::{open_store, DatasetStore, SqliteStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn listing(details: &[&str], pages: &[&str]) -> String {
    let details: String = details
        .iter()
        .map(|d| {
            format!(
                r#"<article class="item-list"><h2>x</h2><a class="more-link" href="{}">Leia mais »</a></article>"#,
                d
            )
        })
        .collect();
    let pages: String = pages
        .iter()
        .map(|p| format!(r#"<a class="page" href="{}">p</a>"#, p))
        .collect();
    format!(
        r#"<html><body><div class="content"><div class="post-listing">{}</div>
        <div class="pagination">{}</div></div></body></html>"#,
        details, pages
    )
}

fn detail(title: &str, date: &str, cats: &[&str], body: &str) -> String {
    let cats: String = cats
        .iter()
        .map(|c| format!(r#"<a href="/category/x/" rel="category tag">{}</a>"#, c))
        .collect();
    format!(
        r#"<html><body>
        <h1 class="name post-title entry-title"><span itemprop="name">{}</span></h1>
        <p class="post-meta"><span class="tie-date">{}</span><span class="post-cats">{}</span></p>
        <div class="entry">{}<div class="clear"></div><div class="share-post">Compartilhar</div></div>
        </body></html>"#,
        title, date, cats, body
    )
}

async fn mount_html(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

/// Two listing pages linking to each other, four detail pages, one duplicate title
async fn mount_site(server: &MockServer) {
    mount_html(
        server,
        "/category/convenios/",
        listing(
            &["/otica-visao/", "/livraria-central/"],
            &["/category/convenios/page/2/"],
        ),
    )
    .await;
    mount_html(
        server,
        "/category/convenios/page/2/",
        listing(
            &["/academia-movimento/", "/otica-visao-2/"],
            &["/category/convenios/"],
        ),
    )
    .await;
    mount_html(
        server,
        "/otica-visao/",
        detail(
            "Ótica Visão",
            "05/02/2024",
            &["Convênios", "Saúde"],
            r#"<p style="color:red">Lentes e armações.</p><p><strong>Desconto:</strong> 15% em armações</p>"#,
        ),
    )
    .await;
    mount_html(
        server,
        "/otica-visao-2/",
        detail("Ótica Visão", "06/02/2024", &["Saúde"], "<p>Repetido</p>"),
    )
    .await;
    mount_html(
        server,
        "/livraria-central/",
        detail(
            "Livraria Central",
            "sem data",
            &["Destaques", "Cultura", "Educação"],
            "<p>Livros técnicos.</p><script>track()</script><p>Descontos: 10% em livros</p>",
        ),
    )
    .await;
    mount_html(
        server,
        "/academia-movimento/",
        detail(
            "Academia Movimento",
            "01/06/2024",
            &["Saúde", "Esporte"],
            "<p>Musculação.</p><p>I - 20% na matrícula<br>II - 10% na mensalidade</p>",
        ),
    )
    .await;
}

fn test_user_agent() -> convenio_search::config::UserAgentConfig {
    convenio_search::config::UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

fn coordinator(server: &MockServer, artifact: &Path, store: Arc<dyn DatasetStore>) -> JobCoordinator {
    let settings = CrawlSettings {
        seed_url: url::Url::parse(&format!("{}/category/convenios/", server.uri())).unwrap(),
        allowed_domains: vec!["127.0.0.1".to_string()],
        artifact_path: artifact.to_path_buf(),
    };
    let fetcher =
        ReqwestFetcher::from_config(&test_user_agent(), Duration::from_secs(5)).unwrap();

    JobCoordinator::new(
        settings,
        Arc::new(fetcher),
        Arc::new(HeuristicExtractor::new()),
        store,
        ProgressEmitter::new(256),
    )
}

#[tokio::test]
async fn test_full_crawl_then_search() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("output").join("convenios.json");
    let store: Arc<dyn DatasetStore> =
        Arc::new(SqliteStore::new(&dir.path().join("convenios.db")).unwrap());
    let jobs = coordinator(&server, &artifact, store.clone());
    let mut events = jobs.subscribe();

    let status = jobs.run().await.unwrap();
    assert_eq!(status.phase, JobPhase::Succeeded);
    assert_eq!(status.pages_crawled, 6);
    assert_eq!(status.items_scraped, 4);
    assert!(!artifact.exists());

    // duplicate title collapsed into the first occurrence
    let all = store.all().await.unwrap();
    assert_eq!(all.len(), 3);

    let otica = all.iter().find(|r| r.title == "Ótica Visão").unwrap();
    assert_eq!(otica.date, "2024-02-05");
    assert_eq!(otica.categories, "Saúde");
    assert_eq!(otica.discounts, "15% em armações");
    assert!(!otica.content.contains("style="));
    assert!(!otica.content.contains("Compartilhar"));

    let livraria = all.iter().find(|r| r.title == "Livraria Central").unwrap();
    assert_eq!(livraria.date, "");
    assert_eq!(livraria.categories, "Cultura, Educação");
    assert_eq!(livraria.discounts, "10% em livros");
    assert!(!livraria.content.contains("<script"));

    assert_eq!(
        store.categories().await.unwrap(),
        vec!["Cultura", "Educação", "Esporte", "Saúde"]
    );

    let engine = QueryEngine::from_config(store.clone(), &SearchConfig::default());
    let response = engine
        .list(&ListParams {
            search: Some("otica".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(response.total_items, 1);
    assert_eq!(response.data[0].highlight.title, "<mark>Ótica</mark> Visão");
    assert_eq!(response.suggestions[0].title, "Ótica Visão");

    let by_date = engine
        .list(&ListParams {
            sort_by: Some("date".to_string()),
            order: Some("desc".to_string()),
            page_size: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_date.total_pages, 2);
    assert_eq!(by_date.data[0].record.title, "Academia Movimento");

    let mut saw_done = false;
    while let Ok(event) = events.try_recv() {
        if let CrawlEvent::Done { message } = event {
            assert_eq!(message, "Scraping concluído com sucesso");
            saw_done = true;
        }
    }
    assert!(saw_done);
}

#[tokio::test]
async fn test_recrawl_reassigns_identifiers() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let dir = TempDir::new().unwrap();
    let store: Arc<dyn DatasetStore> = Arc::new(SqliteStore::new_in_memory().unwrap());
    let jobs = coordinator(&server, &dir.path().join("convenios.json"), store.clone());

    jobs.run().await.unwrap();
    let first: Vec<String> = store.all().await.unwrap().into_iter().map(|r| r.id).collect();

    jobs.run().await.unwrap();
    let second: Vec<String> = store.all().await.unwrap().into_iter().map(|r| r.id).collect();

    assert_eq!(first.len(), second.len());
    assert!(first.iter().all(|id| !second.contains(id)));
}

#[tokio::test]
async fn test_unreachable_seed_leaves_dataset_and_frees_coordinator() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store: Arc<dyn DatasetStore> = Arc::new(SqliteStore::new_in_memory().unwrap());
    let jobs = coordinator(&server, &dir.path().join("convenios.json"), store.clone());

    let err = jobs.run().await.unwrap_err();
    assert!(matches!(err, JobError::Fetch(_)));
    assert_eq!(jobs.status().phase, JobPhase::Failed);

    // a new start is accepted right away
    jobs.start().unwrap();
    for _ in 0..200 {
        if jobs.status().finished {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(jobs.status().phase, JobPhase::Failed);
}

#[tokio::test]
async fn test_store_opened_from_config_file() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("convenios.db");
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[crawler]
seed-url = "https://www.caadf.org.br/category/convenios/"
allowed-domains = ["*.caadf.org.br"]
artifact-path = "{}"

[user-agent]
crawler-name = "ConvenioSearch"
crawler-version = "0.1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[store]
backend = "sqlite"
database-path = "{}"
"#,
            dir.path().join("convenios.json").display(),
            db_path.display()
        ),
    )
    .unwrap();

    let config = load_config(&config_path).unwrap();
    let store = open_store(&config.store).await.unwrap();
    assert_eq!(store.backend_name(), "sqlite");
    assert_eq!(store.count(None, None).await.unwrap(), 0);
    assert!(db_path.exists());
}
