//! Job coordinator: the single-flight crawl lifecycle
//!
//! One crawl runs at a time. `start` checks and sets the running phase under
//! a mutex and hands the crawl to a background task; the caller gets an
//! answer right away and follows the crawl through [`CrawlEvent`]s.
//!
//! Phases move `Idle -> Running -> {Succeeded, Failed}`. Both resting phases
//! accept a new start. The running phase is always released, whether the
//! crawl succeeds, fails or panics.
//!
//! [`CrawlEvent`]: crate::crawler::CrawlEvent

use crate::config::CrawlerConfig;
use crate::crawler::artifact::{ingest_artifact, remove_artifact, write_artifact};
use crate::crawler::events::ProgressEmitter;
use crate::crawler::fetcher::{FetchResult, PageFetcher};
use crate::crawler::frontier::{Frontier, PageKind};
use crate::crawler::parser::parse_listing;
use crate::crawler::CrawlEvent;
use crate::extract::{ExtractedItem, Extractor};
use crate::storage::DatasetStore;
use crate::UrlError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::broadcast;
use url::Url;

/// Errors of the crawl job lifecycle
///
/// Messages are shown to API clients as they are.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Scraping já em andamento")]
    AlreadyRunning,

    #[error("Erro ao executar o crawl: {0}")]
    Fetch(String),

    #[error("{0}")]
    Ingestion(String),
}

/// Where a crawl starts and what it may touch
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub seed_url: Url,
    pub allowed_domains: Vec<String>,
    pub artifact_path: PathBuf,
}

impl CrawlSettings {
    pub fn from_config(config: &CrawlerConfig) -> Result<Self, UrlError> {
        Ok(Self {
            seed_url: Url::parse(&config.seed_url).map_err(|e| UrlError::Parse(e.to_string()))?,
            allowed_domains: config.allowed_domains.clone(),
            artifact_path: PathBuf::from(&config.artifact_path),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Snapshot of the current or last crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub phase: JobPhase,
    pub pages_crawled: u64,
    pub items_scraped: u64,
    pub finished: bool,
    pub scraping_in_progress: bool,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct Inner {
    status: Mutex<JobStatus>,
    events: ProgressEmitter,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn DatasetStore>,
    settings: CrawlSettings,
}

impl Inner {
    fn lock_status(&self) -> MutexGuard<'_, JobStatus> {
        // the status is plain data; a panic mid-update leaves nothing to repair
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

const INTERRUPTED: &str = "Crawl interrompido";

/// Releases the running phase when dropped
struct RunGuard {
    inner: Arc<Inner>,
    outcome: Option<(JobPhase, Option<String>)>,
}

impl RunGuard {
    fn finish(mut self, phase: JobPhase, error: Option<String>) {
        self.outcome = Some((phase, error));
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        // no outcome means the run panicked or was cancelled
        let interrupted = self.outcome.is_none();
        let (phase, error) = self
            .outcome
            .take()
            .unwrap_or((JobPhase::Failed, Some(INTERRUPTED.to_string())));

        {
            let mut status = self.inner.lock_status();
            status.phase = phase;
            status.error = error;
            status.scraping_in_progress = false;
            status.finished = true;
            status.finished_at = Some(Utc::now());
        }

        if interrupted {
            self.inner.events.error(INTERRUPTED);
        }
    }
}

/// Owns the crawl lifecycle; cheap to clone
#[derive(Clone)]
pub struct JobCoordinator {
    inner: Arc<Inner>,
}

impl JobCoordinator {
    pub fn new(
        settings: CrawlSettings,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn DatasetStore>,
        events: ProgressEmitter,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                status: Mutex::new(JobStatus::default()),
                events,
                fetcher,
                extractor,
                store,
                settings,
            }),
        }
    }

    /// Starts a crawl in the background
    ///
    /// Returns as soon as the run is registered; fails with
    /// [`JobError::AlreadyRunning`] if a crawl is in progress.
    pub fn start(&self) -> Result<(), JobError> {
        let guard = self.begin()?;
        let this = self.clone();
        tokio::spawn(async move {
            // the outcome is published through events and status
            let _ = this.execute(guard).await;
        });
        Ok(())
    }

    /// Runs a crawl to completion on the current task
    pub async fn run(&self) -> Result<JobStatus, JobError> {
        let guard = self.begin()?;
        self.execute(guard).await
    }

    pub fn status(&self) -> JobStatus {
        self.inner.lock_status().clone()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_status().phase == JobPhase::Running
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.inner.events.subscribe()
    }

    fn begin(&self) -> Result<RunGuard, JobError> {
        let mut status = self.inner.lock_status();
        if status.phase == JobPhase::Running {
            tracing::warn!("Crawl requested while another is running");
            return Err(JobError::AlreadyRunning);
        }

        *status = JobStatus {
            phase: JobPhase::Running,
            scraping_in_progress: true,
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        Ok(RunGuard {
            inner: Arc::clone(&self.inner),
            outcome: None,
        })
    }

    async fn execute(&self, guard: RunGuard) -> Result<JobStatus, JobError> {
        tracing::info!("Starting crawl at {}", self.inner.settings.seed_url);

        match self.crawl_and_ingest().await {
            Ok(()) => {
                guard.finish(JobPhase::Succeeded, None);
                self.inner.events.done("Scraping concluído com sucesso");
                Ok(self.status())
            }
            Err(e) => {
                let message = e.to_string();
                guard.finish(JobPhase::Failed, Some(message.clone()));
                self.inner.events.error(&message);
                Err(e)
            }
        }
    }

    async fn crawl_and_ingest(&self) -> Result<(), JobError> {
        let path = &self.inner.settings.artifact_path;

        match remove_artifact(path).await {
            Ok(true) => tracing::info!("Removed stale artifact {}", path.display()),
            Ok(false) => {}
            Err(e) => {
                return Err(JobError::Fetch(format!(
                    "não foi possível remover {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        let items = self.crawl().await?;

        write_artifact(path, &items)
            .await
            .map_err(|e| JobError::Fetch(format!("falha ao gravar {}: {}", path.display(), e)))?;

        let outcome = ingest_artifact(path, self.inner.store.as_ref(), &self.inner.events).await;
        if !outcome.ok {
            return Err(JobError::Ingestion(outcome.message));
        }
        Ok(())
    }

    /// Walks listing pages breadth-first and extracts every detail page
    ///
    /// Only a failure of the seed page aborts the crawl; any other page that
    /// cannot be fetched is reported and skipped.
    async fn crawl(&self) -> Result<Vec<ExtractedItem>, JobError> {
        let settings = &self.inner.settings;
        let events = &self.inner.events;

        let mut frontier = Frontier::new(settings.allowed_domains.clone());
        if !frontier.push(settings.seed_url.clone(), PageKind::Listing) {
            return Err(JobError::Fetch(format!(
                "URL inicial fora dos domínios permitidos: {}",
                settings.seed_url
            )));
        }

        let mut items = Vec::new();
        let mut is_seed = true;

        while let Some(page) = frontier.pop() {
            let seed = std::mem::replace(&mut is_seed, false);
            tracing::debug!(url = %page.url, "Fetching");

            let (final_url, body) = match self.inner.fetcher.fetch(&page.url).await {
                FetchResult::Success {
                    final_url, body, ..
                } => (final_url, body),
                failure => {
                    let reason = failure.describe_failure().unwrap_or_default();
                    if seed {
                        return Err(JobError::Fetch(format!("{} ({})", page.url, reason)));
                    }
                    tracing::warn!("Failed to fetch {}: {}", page.url, reason);
                    events.progress(&format!("Falha ao acessar {}: {}", page.url, reason));
                    continue;
                }
            };

            self.inner.lock_status().pages_crawled += 1;

            match page.kind {
                PageKind::Listing => {
                    events.progress(&format!("Acessando: {}", page.url));

                    let base = Url::parse(&final_url).unwrap_or_else(|_| page.url.clone());
                    let links = parse_listing(&body, &base);
                    for url in links.detail_links {
                        frontier.push(url, PageKind::Detail);
                    }
                    for url in links.page_links {
                        frontier.push(url, PageKind::Listing);
                    }
                }
                PageKind::Detail => {
                    events.progress(&format!("Extraindo convênio: {}", page.url));

                    match self.inner.extractor.extract(&body) {
                        Some(item) => {
                            self.inner.lock_status().items_scraped += 1;
                            items.push(item);
                        }
                        None => tracing::warn!("No convênio content at {}", page.url),
                    }
                }
            }
        }

        tracing::info!(
            "Crawl finished: {} pages visited, {} items extracted",
            frontier.seen_count(),
            items.len()
        );
        Ok(items)
    }
}
