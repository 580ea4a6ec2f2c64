//! Breadth-first crawl frontier
//!
//! Every listing page is queued for link discovery and every detail page for
//! extraction, in discovery order. A URL is queued at most once per run,
//! keyed by [`frontier_key`], so cyclic pagination ends once every listing
//! page has been seen. Links outside the allowed domains are never queued.

use crate::url::{frontier_key, is_allowed};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// What the crawler does with a fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Scanned for detail and pagination links
    Listing,
    /// Handed to the extractor
    Detail,
}

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPage {
    pub url: Url,
    pub kind: PageKind,
}

/// FIFO queue of pages with a visited set
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<QueuedPage>,
    seen: HashSet<String>,
    allowed_domains: Vec<String>,
}

impl Frontier {
    pub fn new(allowed_domains: Vec<String>) -> Self {
        Self {
            queue: VecDeque::new(),
            seen: HashSet::new(),
            allowed_domains,
        }
    }

    /// Queues a page unless it is off-domain or already seen
    ///
    /// Returns true if the page was queued.
    pub fn push(&mut self, url: Url, kind: PageKind) -> bool {
        if !is_allowed(&url, &self.allowed_domains) {
            tracing::debug!("Skipping off-domain link {}", url);
            return false;
        }

        let key = match frontier_key(url.as_str()) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!("Skipping unusable link {}: {}", url, e);
                return false;
            }
        };

        if !self.seen.insert(key) {
            return false;
        }

        self.queue.push_back(QueuedPage { url, kind });
        true
    }

    pub fn pop(&mut self) -> Option<QueuedPage> {
        self.queue.pop_front()
    }

    /// Pages waiting to be fetched
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Distinct pages queued since the frontier was created
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontier() -> Frontier {
        Frontier::new(vec!["*.example.com".to_string()])
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = frontier();
        frontier.push(url("https://example.com/a"), PageKind::Listing);
        frontier.push(url("https://example.com/b"), PageKind::Detail);

        let first = frontier.pop().unwrap();
        assert_eq!(first.url.as_str(), "https://example.com/a");
        assert_eq!(first.kind, PageKind::Listing);
        assert_eq!(frontier.pop().unwrap().kind, PageKind::Detail);
        assert!(frontier.pop().is_none());
    }

    #[test]
    fn test_duplicates_are_queued_once() {
        let mut frontier = frontier();
        assert!(frontier.push(url("https://example.com/page/2/"), PageKind::Listing));
        assert!(!frontier.push(url("https://www.example.com/page/2"), PageKind::Listing));
        assert!(!frontier.push(url("https://example.com/page/2/#x"), PageKind::Listing));
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.seen_count(), 1);
    }

    #[test]
    fn test_seen_survives_pop() {
        let mut frontier = frontier();
        frontier.push(url("https://example.com/page/1/"), PageKind::Listing);
        frontier.pop();

        // pagination linking back to an already-visited page
        assert!(!frontier.push(url("https://example.com/page/1/"), PageKind::Listing));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_off_domain_rejected() {
        let mut frontier = frontier();
        assert!(!frontier.push(url("https://facebook.com/share"), PageKind::Detail));
        assert!(frontier.push(url("https://blog.example.com/post"), PageKind::Detail));
        assert_eq!(frontier.len(), 1);
    }
}
