//! Intermediate JSON artifact and the ingestion step
//!
//! The crawl writes one JSON array of [`ExtractedItem`]s. Ingestion reads it
//! exactly once, assigns identifiers, replaces the dataset and deletes the
//! file.

use crate::crawler::events::ProgressEmitter;
use crate::crawler::JobError;
use crate::extract::ExtractedItem;
use crate::storage::{DatasetStore, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;
use uuid::Uuid;

/// Title given to items scraped without one
pub const UNTITLED: &str = "Sem título";

/// Result of one ingestion, reported rather than raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub ok: bool,
    pub message: String,
}

/// Writes the items as a pretty-printed JSON array, creating parent directories
pub async fn write_artifact(path: &Path, items: &[ExtractedItem]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(items)?;
    tokio::fs::write(path, json).await
}

/// Deletes the artifact; returns false if there was none
pub async fn remove_artifact(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Turns scraped items into records with fresh identifiers
///
/// Items sharing a title within one batch resolve to the identifier of the
/// first one; later duplicates are dropped.
pub fn assign_ids(items: Vec<ExtractedItem>) -> Vec<Record> {
    let mut ids: HashMap<String, String> = HashMap::new();
    let mut records = Vec::with_capacity(items.len());

    for item in items {
        let title = match item.title.trim() {
            "" => UNTITLED.to_string(),
            title => title.to_string(),
        };

        if ids.contains_key(&title) {
            tracing::debug!("Duplicate title '{}' merged into first occurrence", title);
            continue;
        }

        let id = Uuid::new_v4().to_string();
        ids.insert(title.clone(), id.clone());
        records.push(Record {
            id,
            title,
            date: item.date,
            categories: item.cats,
            content: item.content,
            discounts: item.discounts,
        });
    }

    records
}

/// Loads the artifact into the store
pub async fn ingest_artifact(
    path: &Path,
    store: &dyn DatasetStore,
    events: &ProgressEmitter,
) -> IngestOutcome {
    match try_ingest(path, store, events).await {
        Ok(count) => {
            let message = format!("Dados processados com sucesso ({} convênios)", count);
            tracing::info!("{}", message);
            IngestOutcome { ok: true, message }
        }
        Err(e) => {
            tracing::error!("Ingestion of {} failed: {}", path.display(), e);
            IngestOutcome {
                ok: false,
                message: e.to_string(),
            }
        }
    }
}

async fn try_ingest(
    path: &Path,
    store: &dyn DatasetStore,
    events: &ProgressEmitter,
) -> Result<usize, JobError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(JobError::Ingestion("Arquivo JSON não encontrado".to_string()))
        }
        Err(e) => {
            return Err(JobError::Ingestion(format!(
                "Erro ao ler arquivo JSON: {}",
                e
            )))
        }
    };

    let items: Vec<ExtractedItem> = serde_json::from_slice(&bytes)
        .map_err(|e| JobError::Ingestion(format!("Arquivo JSON inválido: {}", e)))?;

    let records = assign_ids(items);
    for record in &records {
        events.progress(&format!("Inserindo convênio: {}", record.title));
    }

    store
        .replace_all(&records)
        .await
        .map_err(|e| JobError::Ingestion(format!("Erro ao processar convênios: {}", e)))?;

    if let Err(e) = remove_artifact(path).await {
        tracing::warn!("Could not remove {}: {}", path.display(), e);
    }

    Ok(records.len())
}
