// handlers.rs
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::{
    cache::ResponseCache,
    error::AppError,
    ip::ClientIp,
    models::{Idea, IdeaPage, ResetReceipt, VoteReceipt, VoteStatus},
    services::VoteService,
};

#[derive(Clone)]
pub struct AppState {
    pub service: VoteService,
    pub cache: Arc<ResponseCache>,
}

/// Raw pagination parameters; validation and defaults live in the service.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// List a page of ideas with their vote counts
pub async fn list_ideas(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<IdeaPage>, AppError> {
    let page = state
        .service
        .list_ideas(params.limit.as_deref(), params.offset.as_deref())
        .await?;
    Ok(Json(page))
}

/// Fetch a single idea
pub async fn get_idea(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Idea>, AppError> {
    Ok(Json(state.service.get_idea(&id).await?))
}

/// The caller's votes so far
pub async fn vote_status(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<Json<VoteStatus>, AppError> {
    Ok(Json(state.service.vote_status(&ip).await?))
}

/// Vote for an idea
pub async fn vote_idea(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ClientIp(ip): ClientIp,
) -> Result<Json<VoteReceipt>, AppError> {
    let receipt = state.service.vote_idea(&id, &ip).await?;
    state.cache.invalidate();
    Ok(Json(receipt))
}

/// Withdraw every vote the caller has cast
pub async fn reset_votes(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
) -> Result<Json<ResetReceipt>, AppError> {
    let receipt = state.service.reset_votes(&ip).await?;
    state.cache.invalidate();
    Ok(Json(receipt))
}
