use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::Value;
use shared::{
    domain::{BoardConfig, Card, CardId, Column, ColumnId},
    protocol::{ApiEnvelope, AssignRequest, BoardAction, CardPatch, NewCard},
};
use storage::Storage;
use tracing::info;

mod config;

use config::{load_settings, prepare_database_url};

struct AppState {
    storage: Storage,
}

type ApiError = (StatusCode, Json<ApiEnvelope<Value>>);
type ApiResult<T> = Result<Json<ApiEnvelope<T>>, ApiError>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await?;
    let app = build_router(Arc::new(AppState { storage }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "board server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/cards", get(list_cards).post(create_card))
        .route("/cards/:card_id", patch(patch_card).delete(delete_card))
        .route("/cards/:card_id/assign", post(assign_card))
        .route("/actions", post(actions))
        .route("/config", get(get_config).put(put_config))
        .with_state(state)
}

/// Stages a fresh board starts with, until the first `PUT /config`.
fn default_board_config() -> BoardConfig {
    let stages = ["Queued", "Machining", "Inspection", "Done"];
    BoardConfig {
        columns: stages
            .iter()
            .enumerate()
            .map(|(position, title)| Column {
                id: ColumnId(title.to_lowercase()),
                title: title.to_string(),
                position: position as u32,
            })
            .collect(),
    }
}

fn internal(err: anyhow::Error) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiEnvelope::err(err.to_string())),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ApiEnvelope::err(message)))
}

fn not_found(message: impl Into<String>) -> ApiError {
    (StatusCode::NOT_FOUND, Json(ApiEnvelope::err(message)))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_cards(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Card>> {
    let cards = state.storage.list_cards().await.map_err(internal)?;
    Ok(Json(ApiEnvelope::ok(cards)))
}

async fn create_card(
    State(state): State<Arc<AppState>>,
    Json(new_card): Json<NewCard>,
) -> ApiResult<Card> {
    if new_card.title.trim().is_empty() {
        return Err(bad_request("card title cannot be empty"));
    }
    ensure_column_exists(&state, &new_card.column_id).await?;
    let card = state
        .storage
        .insert_card(&new_card)
        .await
        .map_err(internal)?;
    Ok(Json(ApiEnvelope::ok(card)))
}

async fn patch_card(
    State(state): State<Arc<AppState>>,
    Path(card_id): Path<CardId>,
    Json(card_patch): Json<CardPatch>,
) -> ApiResult<Card> {
    if card_patch
        .title
        .as_deref()
        .is_some_and(|t| t.trim().is_empty())
    {
        return Err(bad_request("card title cannot be empty"));
    }
    if let Some(column_id) = &card_patch.column_id {
        ensure_column_exists(&state, column_id).await?;
    }
    let card = state
        .storage
        .patch_card(card_id, &card_patch)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("card not found"))?;
    Ok(Json(ApiEnvelope::ok(card)))
}

async fn delete_card(
    State(state): State<Arc<AppState>>,
    Path(card_id): Path<CardId>,
) -> ApiResult<Value> {
    let deleted = state
        .storage
        .delete_card(card_id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(not_found("card not found"));
    }
    Ok(Json(ApiEnvelope::ok(Value::Null)))
}

async fn assign_card(
    State(state): State<Arc<AppState>>,
    Path(card_id): Path<CardId>,
    Json(request): Json<AssignRequest>,
) -> ApiResult<Card> {
    let card = state
        .storage
        .set_assignee(card_id, request.assignee)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("card not found"))?;
    Ok(Json(ApiEnvelope::ok(card)))
}

async fn actions(
    State(state): State<Arc<AppState>>,
    Json(action): Json<BoardAction>,
) -> ApiResult<Card> {
    match action {
        BoardAction::MoveCard { card_id, column_id } => {
            ensure_column_exists(&state, &column_id).await?;
            let card = state
                .storage
                .set_card_column(card_id, &column_id)
                .await
                .map_err(internal)?
                .ok_or_else(|| not_found("card not found"))?;
            Ok(Json(ApiEnvelope::ok(card)))
        }
    }
}

async fn get_config(State(state): State<Arc<AppState>>) -> ApiResult<BoardConfig> {
    let config = state
        .storage
        .load_config()
        .await
        .map_err(internal)?
        .unwrap_or_else(default_board_config);
    Ok(Json(ApiEnvelope::ok(config)))
}

async fn put_config(
    State(state): State<Arc<AppState>>,
    Json(board_config): Json<BoardConfig>,
) -> ApiResult<BoardConfig> {
    if board_config.columns.is_empty() {
        return Err(bad_request("board must keep at least one column"));
    }
    for column in &board_config.columns {
        if column.title.trim().is_empty() {
            return Err(bad_request("column titles cannot be empty"));
        }
    }
    let mut seen = std::collections::HashSet::new();
    for column in &board_config.columns {
        if !seen.insert(&column.id) {
            return Err(bad_request(format!("duplicate column id {}", column.id)));
        }
    }
    state
        .storage
        .save_config(&board_config)
        .await
        .map_err(internal)?;
    Ok(Json(ApiEnvelope::ok(board_config)))
}

async fn ensure_column_exists(state: &AppState, column_id: &ColumnId) -> Result<(), ApiError> {
    let config = state
        .storage
        .load_config()
        .await
        .map_err(internal)?
        .unwrap_or_else(default_board_config);
    if config.find_column(column_id).is_none() {
        return Err(bad_request(format!("unknown column {column_id}")));
    }
    Ok(())
}
