use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::ledger::{self, LedgerError};
use crate::models::{Idea, UserBadge, Vote};
use crate::state::AppState;
use crate::week::{current_week_start, previous_week_start};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub idea_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteResponse {
    pub vote: Vote,
    pub changed_from: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentVoteResponse {
    pub vote: Option<Vote>,
    pub idea: Option<Idea>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastWeekResponse {
    pub your_pick: Option<Idea>,
    pub winner: Option<Idea>,
    pub winner_votes: i64,
    pub earned_badge: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgesResponse {
    pub badges: Vec<BadgeEntry>,
    pub tier: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeEntry {
    pub badge: UserBadge,
    pub idea: Idea,
}

pub async fn cast_vote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CastVoteRequest>,
) -> AppResult<Json<CastVoteResponse>> {
    let mut conn = state.db()?;
    let outcome = ledger::cast_vote(&mut conn, user.user_id, payload.idea_id, current_week_start())
        .map_err(|err| match err {
            LedgerError::NotFound => {
                AppError::not_found_with("idea not found or not open for voting")
            }
            LedgerError::Database(db) => AppError::from(db),
        })?;

    Ok(Json(CastVoteResponse {
        vote: outcome.vote,
        changed_from: outcome.changed_from,
    }))
}

pub async fn current_vote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<CurrentVoteResponse>> {
    let mut conn = state.db()?;
    let current = ledger::get_user_vote(&mut conn, user.user_id, current_week_start())?;
    let (vote, idea) = match current {
        Some((vote, idea)) => (Some(vote), Some(idea)),
        None => (None, None),
    };
    Ok(Json(CurrentVoteResponse { vote, idea }))
}

pub async fn last_week(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<LastWeekResponse>> {
    let mut conn = state.db()?;
    let result = ledger::last_week_result(&mut conn, user.user_id, previous_week_start())?;
    let (winner, winner_votes) = match result.winner {
        Some((idea, votes)) => (Some(idea), votes),
        None => (None, 0),
    };
    Ok(Json(LastWeekResponse {
        your_pick: result.last_week_vote,
        winner,
        winner_votes,
        earned_badge: result.earned_badge,
    }))
}

pub async fn badges(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<BadgesResponse>> {
    let mut conn = state.db()?;
    let rows = ledger::user_badges_with_ideas(&mut conn, user.user_id)?;
    let tier = ledger::badge_tier(rows.len());
    let badges = rows
        .into_iter()
        .map(|(badge, idea)| BadgeEntry { badge, idea })
        .collect();
    Ok(Json(BadgesResponse { badges, tier }))
}
