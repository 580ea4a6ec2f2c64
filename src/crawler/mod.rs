//! Crawl pipeline: fetch, discover, extract, ingest
//!
//! This module contains:
//! - The page fetcher seam and its reqwest implementation
//! - Link discovery on listing pages and the breadth-first frontier
//! - The intermediate JSON artifact and the ingestion step
//! - Progress events and the single-flight job coordinator

mod artifact;
mod coordinator;
mod events;
mod fetcher;
mod frontier;
mod parser;

pub use artifact::{
    assign_ids, ingest_artifact, remove_artifact, write_artifact, IngestOutcome, UNTITLED,
};
pub use coordinator::{CrawlSettings, JobCoordinator, JobError, JobPhase, JobStatus};
pub use events::{truncate_message, CrawlEvent, ProgressEmitter, MAX_MESSAGE_CHARS};
pub use fetcher::{build_http_client, FetchResult, PageFetcher, ReqwestFetcher};
pub use frontier::{Frontier, PageKind, QueuedPage};
pub use parser::{parse_listing, ListingLinks};
