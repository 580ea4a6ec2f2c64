//! Progress events published while a crawl runs
//!
//! Events go out on a `tokio::sync::broadcast` channel. Sending never waits
//! for observers: a slow observer loses the oldest events, and an event sent
//! with no observers connected is simply dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Longest message, in characters, before truncation
pub const MAX_MESSAGE_CHARS: usize = 300;

const TRUNCATION_SUFFIX: &str = "... (mensagem truncada)";

/// One push notification about the running crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum CrawlEvent {
    #[serde(rename = "crawl_progress")]
    Progress { message: String },

    #[serde(rename = "crawl_error")]
    Error { message: String },

    #[serde(rename = "crawl_done")]
    Done { message: String },
}

impl CrawlEvent {
    pub fn message(&self) -> &str {
        match self {
            Self::Progress { message } | Self::Error { message } | Self::Done { message } => {
                message
            }
        }
    }
}

/// Cuts a message to [`MAX_MESSAGE_CHARS`] characters
pub fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(MAX_MESSAGE_CHARS).collect();
    truncated.push_str(TRUNCATION_SUFFIX);
    truncated
}

/// Publishing side of the progress channel
#[derive(Debug, Clone)]
pub struct ProgressEmitter {
    sender: broadcast::Sender<CrawlEvent>,
}

impl ProgressEmitter {
    /// Creates a channel keeping at most `capacity` unread events per observer
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CrawlEvent> {
        self.sender.subscribe()
    }

    pub fn progress(&self, message: &str) {
        let message = truncate_message(message);
        tracing::info!("{}", message);
        self.emit(CrawlEvent::Progress { message });
    }

    pub fn error(&self, message: &str) {
        let message = truncate_message(message);
        tracing::error!("{}", message);
        self.emit(CrawlEvent::Error { message });
    }

    pub fn done(&self, message: &str) {
        let message = truncate_message(message);
        tracing::info!("{}", message);
        self.emit(CrawlEvent::Done { message });
    }

    fn emit(&self, event: CrawlEvent) {
        // Err only means nobody is listening
        let _ = self.sender.send(event);
    }
}
