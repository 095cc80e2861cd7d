use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Idea, STATUS_APPROVED, STATUS_REJECTED};
use crate::state::AppState;
use crate::store::{self, IdeaPatch};
use crate::week::current_week_start;

const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";
const MODERATOR: &str = "admin";

#[derive(Deserialize)]
pub struct ModerationRequest {
    pub notes: Option<String>,
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let provided = headers
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if provided.is_empty() || provided != state.config.admin_password {
        return Err(AppError::unauthorized());
    }
    Ok(())
}

pub async fn pending_ideas(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<Idea>>> {
    require_admin(&state, &headers)?;
    let mut conn = state.db()?;
    let ideas = store::list_by_status(&mut conn, crate::models::STATUS_PENDING)?;
    Ok(Json(ideas))
}

pub async fn approve_idea(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Option<Json<ModerationRequest>>,
) -> AppResult<Json<Idea>> {
    require_admin(&state, &headers)?;
    let notes = payload.as_ref().and_then(|p| p.notes.as_deref());
    let mut conn = state.db()?;
    let idea = store::update_status(&mut conn, id, STATUS_APPROVED, MODERATOR, notes)?;
    Ok(Json(idea))
}

pub async fn reject_idea(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    payload: Option<Json<ModerationRequest>>,
) -> AppResult<Json<Idea>> {
    require_admin(&state, &headers)?;
    let notes = payload.as_ref().and_then(|p| p.notes.as_deref());
    let mut conn = state.db()?;
    let idea = store::update_status(&mut conn, id, STATUS_REJECTED, MODERATOR, notes)?;
    Ok(Json(idea))
}

/// Pushes every approved idea of the current week live.
pub async fn publish_week(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    require_admin(&state, &headers)?;
    let week = current_week_start();
    let mut conn = state.db()?;
    let published = store::bulk_publish(&mut conn, week)?;
    Ok(Json(json!({ "week": week, "published": published.len() })))
}

pub async fn update_idea(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(patch): Json<IdeaPatch>,
) -> AppResult<Json<Idea>> {
    require_admin(&state, &headers)?;
    let mut conn = state.db()?;
    let idea = store::update_fields(&mut conn, id, &patch)?;
    Ok(Json(idea))
}
