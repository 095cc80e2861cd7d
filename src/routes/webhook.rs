use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::store;
use crate::synthesize::IdeaDraft;
use crate::week::current_week_start;

const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Deserialize)]
pub struct IngestRequest {
    pub batch_id: Option<String>,
    pub ideas: Vec<IdeaDraft>,
    #[serde(default)]
    #[allow(dead_code)]
    pub metadata: Option<Value>,
}

/// External pipelines push pre-synthesized drafts here. Same diversity and
/// moderation path as the in-process scraper.
pub async fn ingest_ideas(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<IngestRequest>,
) -> AppResult<Json<Value>> {
    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if provided.is_empty() || provided != state.config.webhook_secret {
        return Err(AppError::unauthorized());
    }

    if payload.ideas.is_empty() {
        return Err(AppError::bad_request("ideas must be a non-empty array"));
    }

    let week = current_week_start();
    let batch_id = payload
        .batch_id
        .unwrap_or_else(|| format!("webhook-{}", chrono::Utc::now().timestamp()));

    let mut conn = state.db()?;
    let recent = store::recent_fingerprints(&mut conn)?;

    let mut inserted = Vec::new();
    for draft in &payload.ideas {
        match store::insert_draft(&mut conn, draft, week, &batch_id, &recent) {
            Ok(idea) => inserted.push(idea),
            Err(err) => error!(name = %draft.name, error = %err, "failed to ingest idea"),
        }
    }

    Ok(Json(json!({
        "message": format!("{} ideas received and queued for moderation", inserted.len()),
        "ideas": inserted,
        "weekStart": week,
    })))
}
