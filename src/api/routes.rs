//! JSON route handlers

use crate::api::AppState;
use crate::crawler::JobError;
use crate::query::{ListParams, ListResponse};
use crate::storage::Record;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// `{ok, message}` answer for commands and errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
    pub message: String,
}

impl Ack {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

pub(crate) async fn start_scrape(State(state): State<AppState>) -> (StatusCode, Json<Ack>) {
    match state.jobs.start() {
        Ok(()) => (StatusCode::OK, Json(Ack::success("Scraping iniciado"))),
        Err(e @ JobError::AlreadyRunning) => {
            (StatusCode::BAD_REQUEST, Json(Ack::failure(e.to_string())))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Ack::failure(e.to_string())),
        ),
    }
}

pub(crate) async fn list_convenios(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, (StatusCode, Json<Ack>)> {
    state
        .engine
        .list(&params)
        .await
        .map(Json)
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(Ack::failure(e.to_string()))))
}

pub(crate) async fn get_convenio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.engine.get(&id).await {
        Some(record) => Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(Ack::failure("Convênio não encontrado")),
        )
            .into_response(),
    }
}

pub(crate) async fn convenios_by_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Json<Vec<Record>> {
    Json(state.engine.by_category(&category).await)
}

pub(crate) async fn get_categories(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.categories().await)
}

pub(crate) async fn all_convenios(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(state.engine.all().await)
}
