use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use diesel::prelude::*;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::ledger;
use crate::models::{Idea, WeeklyBatch};
use crate::schema::weekly_batches;
use crate::store;
use crate::state::AppState;
use crate::week::{current_week_start, previous_week_start, week_start};

#[derive(Serialize)]
pub struct IdeaWithVotes {
    #[serde(flatten)]
    pub idea: Idea,
    pub votes: i64,
}

#[derive(Serialize)]
pub struct LeaderboardEntry {
    #[serde(flatten)]
    pub idea: Idea,
    pub votes: i64,
    pub category: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyIdeasResponse {
    pub ideas: Vec<Idea>,
    pub week_start: NaiveDate,
}

#[derive(Serialize)]
pub struct BatchWithWinner {
    #[serde(flatten)]
    pub batch: WeeklyBatch,
    pub winner: Option<Idea>,
}

#[derive(Serialize)]
pub struct WinnerResponse {
    pub week: NaiveDate,
    pub winner: Option<IdeaWithVotes>,
    pub total_votes: i32,
    pub total_ideas: i32,
}

fn category_label(idea: &Idea) -> String {
    match idea.tags.get("category").and_then(Value::as_str) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => "General".to_string(),
    }
}

pub async fn list_ideas(State(state): State<AppState>) -> AppResult<Json<Vec<Idea>>> {
    let mut conn = state.db()?;
    let ideas = store::list_published(&mut conn)?;
    Ok(Json(ideas))
}

pub async fn weekly_ideas(State(state): State<AppState>) -> AppResult<Json<WeeklyIdeasResponse>> {
    let mut conn = state.db()?;
    let week_start = current_week_start();
    let ideas = store::list_by_week(
        &mut conn,
        week_start,
        Some(crate::models::STATUS_PUBLISHED),
    )?;
    Ok(Json(WeeklyIdeasResponse { ideas, week_start }))
}

/// Batch history, newest first, with the winner record embedded where one
/// has been settled.
pub async fn weekly_batches(State(state): State<AppState>) -> AppResult<Json<Vec<BatchWithWinner>>> {
    let mut conn = state.db()?;
    let batches: Vec<WeeklyBatch> = weekly_batches::table
        .order(weekly_batches::week_start_date.desc())
        .load(&mut conn)?;

    let mut enriched = Vec::with_capacity(batches.len());
    for batch in batches {
        let winner = match batch.winner_idea_id {
            Some(id) => store::find_by_id(&mut conn, id)?,
            None => None,
        };
        enriched.push(BatchWithWinner { batch, winner });
    }
    Ok(Json(enriched))
}

/// Top three of last week by vote count, each with a category label pulled
/// from the idea's tags.
pub async fn leaderboard(State(state): State<AppState>) -> AppResult<Json<Vec<LeaderboardEntry>>> {
    let mut conn = state.db()?;
    let last_week = previous_week_start();

    let ideas = store::list_by_week(
        &mut conn,
        last_week,
        Some(crate::models::STATUS_PUBLISHED),
    )?;

    let mut tallied: Vec<(Idea, i64)> = ideas
        .into_iter()
        .map(|idea| {
            let votes = ledger::count_votes(&mut conn, idea.id)?;
            Ok((idea, votes))
        })
        .collect::<Result<_, diesel::result::Error>>()?;
    tallied.sort_by(|a, b| b.1.cmp(&a.1));

    let entries = tallied
        .into_iter()
        .take(3)
        .map(|(idea, votes)| LeaderboardEntry {
            category: category_label(&idea),
            idea,
            votes,
        })
        .collect();
    Ok(Json(entries))
}

pub async fn winner_for_week(
    State(state): State<AppState>,
    Path(week): Path<NaiveDate>,
) -> AppResult<Json<WinnerResponse>> {
    let mut conn = state.db()?;
    let week = week_start(week);

    let batch: WeeklyBatch = weekly_batches::table
        .find(week)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::not_found_with("no batch recorded for that week"))?;

    let winner = match batch.winner_idea_id {
        Some(id) => {
            let idea = store::get_by_id(&mut conn, id)?;
            let votes = ledger::count_votes(&mut conn, id)?;
            Some(IdeaWithVotes { idea, votes })
        }
        None => None,
    };

    Ok(Json(WinnerResponse {
        week,
        winner,
        total_votes: batch.total_votes,
        total_ideas: batch.total_ideas,
    }))
}

pub async fn get_idea(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<IdeaWithVotes>> {
    let mut conn = state.db()?;
    // Unpublished ideas stay invisible here; moderation reads them through
    // the admin surface.
    let idea = store::find_published(&mut conn, id)?
        .ok_or_else(|| AppError::not_found_with("idea not found"))?;
    let votes = ledger::count_votes(&mut conn, id)?;
    Ok(Json(IdeaWithVotes { idea, votes }))
}
