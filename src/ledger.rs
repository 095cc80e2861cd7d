//! Voting ledger: one active vote per user per publication week.

use chrono::NaiveDate;
use diesel::prelude::*;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Idea, NewVote, UserBadge, Vote, STATUS_PUBLISHED};
use crate::schema::{ideas, user_badges, votes, weekly_batches};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("idea not found or not from current week")]
    NotFound,
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
}

#[derive(Debug)]
pub struct CastOutcome {
    pub vote: Vote,
    pub changed_from: Option<Uuid>,
}

/// Casts or changes a vote. The target idea must be published in the given
/// week. Replacement is delete-then-insert inside one transaction, so a
/// reader never observes a half-applied change. There is no unique
/// constraint on (user, week); two simultaneous casts by the same user can
/// still both land, a race the product accepts.
pub fn cast_vote(
    conn: &mut PgConnection,
    user_id: Uuid,
    idea_id: Uuid,
    week: NaiveDate,
) -> Result<CastOutcome, LedgerError> {
    conn.transaction(|conn| {
        let target: Option<Idea> = ideas::table
            .find(idea_id)
            .filter(ideas::status.eq(STATUS_PUBLISHED))
            .filter(ideas::week_published.eq(week))
            .first(conn)
            .optional()?;
        if target.is_none() {
            return Err(LedgerError::NotFound);
        }

        let week_idea_ids: Vec<Uuid> = ideas::table
            .filter(ideas::week_published.eq(week))
            .select(ideas::id)
            .load(conn)?;

        let existing: Option<Vote> = votes::table
            .filter(votes::user_id.eq(user_id))
            .filter(votes::idea_id.eq_any(&week_idea_ids))
            .first(conn)
            .optional()?;

        let changed_from = existing.as_ref().map(|vote| vote.idea_id);
        if let Some(previous) = existing {
            diesel::delete(votes::table.find(previous.id)).execute(conn)?;
        }

        let new_vote = NewVote {
            id: Uuid::new_v4(),
            idea_id,
            user_id,
        };
        diesel::insert_into(votes::table)
            .values(&new_vote)
            .execute(conn)?;

        let vote = votes::table.find(new_vote.id).first(conn)?;
        Ok(CastOutcome { vote, changed_from })
    })
}

/// The user's current vote for the week, joined with its idea.
pub fn get_user_vote(
    conn: &mut PgConnection,
    user_id: Uuid,
    week: NaiveDate,
) -> QueryResult<Option<(Vote, Idea)>> {
    votes::table
        .inner_join(ideas::table)
        .filter(votes::user_id.eq(user_id))
        .filter(ideas::week_published.eq(week))
        .filter(ideas::status.eq(STATUS_PUBLISHED))
        .first(conn)
        .optional()
}

pub fn count_votes(conn: &mut PgConnection, idea_id: Uuid) -> QueryResult<i64> {
    votes::table
        .filter(votes::idea_id.eq(idea_id))
        .count()
        .get_result(conn)
}

#[derive(Debug)]
pub struct LastWeekResult {
    pub last_week_vote: Option<Idea>,
    pub winner: Option<(Idea, i64)>,
    pub earned_badge: bool,
}

/// How the previous week went for this user: what they picked, who won, and
/// whether they earned a badge for picking the winner.
pub fn last_week_result(
    conn: &mut PgConnection,
    user_id: Uuid,
    last_week: NaiveDate,
) -> QueryResult<LastWeekResult> {
    let winner_id: Option<Uuid> = weekly_batches::table
        .find(last_week)
        .select(weekly_batches::winner_idea_id)
        .first(conn)
        .optional()?
        .flatten();

    let Some(winner_id) = winner_id else {
        return Ok(LastWeekResult {
            last_week_vote: None,
            winner: None,
            earned_badge: false,
        });
    };

    let winner: Idea = ideas::table.find(winner_id).first(conn)?;
    let winner_votes = count_votes(conn, winner_id)?;

    let last_week_vote = get_user_vote(conn, user_id, last_week)?.map(|(_, idea)| idea);

    let earned_badge = user_badges::table
        .find((user_id, winner_id))
        .first::<UserBadge>(conn)
        .optional()?
        .is_some();

    Ok(LastWeekResult {
        last_week_vote,
        winner: Some((winner, winner_votes)),
        earned_badge,
    })
}

/// All badges for a user, newest first, joined with the winning ideas.
pub fn user_badges_with_ideas(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> QueryResult<Vec<(UserBadge, Idea)>> {
    user_badges::table
        .inner_join(ideas::table)
        .filter(user_badges::user_id.eq(user_id))
        .order(user_badges::awarded_at.desc())
        .load(conn)
}

/// Display-only bucketing of a lifetime winning-pick count.
pub fn badge_tier(count: usize) -> &'static str {
    match count {
        0 => "none",
        1..=2 => "bronze",
        3..=5 => "silver",
        6..=10 => "gold",
        _ => "diamond",
    }
}

#[cfg(test)]
mod tests {
    use super::badge_tier;

    #[test]
    fn tier_bands() {
        assert_eq!(badge_tier(0), "none");
        assert_eq!(badge_tier(1), "bronze");
        assert_eq!(badge_tier(2), "bronze");
        assert_eq!(badge_tier(3), "silver");
        assert_eq!(badge_tier(5), "silver");
        assert_eq!(badge_tier(6), "gold");
        assert_eq!(badge_tier(10), "gold");
        assert_eq!(badge_tier(11), "diamond");
    }
}
