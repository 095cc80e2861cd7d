//! Winner calculation for a completed week: tally, select, record, badge.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use tracing::info;
use uuid::Uuid;

use crate::ledger::count_votes;
use crate::models::{Idea, NewUserBadge, WeeklyBatch, BADGE_WINNING_PICK, STATUS_PUBLISHED};
use crate::schema::{ideas, user_badges, votes, weekly_batches};

#[derive(Debug)]
pub struct WinnerReport {
    pub winner: Idea,
    pub batch: WeeklyBatch,
    pub badge_count: usize,
}

/// Picks the strict-maximum vote count; ties go to the idea listed first.
/// Pure so the tie-break is testable without a database.
pub fn select_winner<T>(tallies: &[(T, i64)]) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;
    for (index, (_, count)) in tallies.iter().enumerate() {
        match best {
            Some((_, best_count)) if *count <= best_count => {}
            _ => best = Some((index, *count)),
        }
    }
    best.map(|(index, _)| index)
}

/// Tallies votes for every published idea of the week, records the outcome on
/// the weekly batch, and awards a badge to every voter who picked the winner.
/// Re-running for the same week is idempotent: the batch upsert overwrites
/// the same values and badge inserts ignore duplicates.
///
/// Returns `None` when the week has no published ideas.
pub fn compute_winner(
    conn: &mut PgConnection,
    week: NaiveDate,
) -> QueryResult<Option<WinnerReport>> {
    let week_ideas: Vec<Idea> = ideas::table
        .filter(ideas::week_published.eq(week))
        .filter(ideas::status.eq(STATUS_PUBLISHED))
        .order(ideas::created_at.asc())
        .load(conn)?;

    if week_ideas.is_empty() {
        info!(%week, "no published ideas, skipping winner calculation");
        return Ok(None);
    }

    let mut tallies = Vec::with_capacity(week_ideas.len());
    for idea in week_ideas {
        let count = count_votes(conn, idea.id)?;
        tallies.push((idea, count));
    }

    let total_votes: i64 = tallies.iter().map(|(_, count)| count).sum();
    let Some(winner_index) = select_winner(&tallies) else {
        return Ok(None);
    };
    let (winner, winner_votes) = &tallies[winner_index];
    info!(
        winner = %winner.name,
        votes = winner_votes,
        total_votes,
        "selected weekly winner"
    );

    let now = Utc::now().naive_utc();
    diesel::insert_into(weekly_batches::table)
        .values((
            weekly_batches::week_start_date.eq(week),
            weekly_batches::winner_idea_id.eq(Some(winner.id)),
            weekly_batches::total_ideas.eq(tallies.len() as i32),
            weekly_batches::total_votes.eq(total_votes as i32),
        ))
        .on_conflict(weekly_batches::week_start_date)
        .do_update()
        .set((
            weekly_batches::winner_idea_id.eq(Some(winner.id)),
            weekly_batches::total_ideas.eq(tallies.len() as i32),
            weekly_batches::total_votes.eq(total_votes as i32),
            weekly_batches::updated_at.eq(now),
        ))
        .execute(conn)?;

    let batch: WeeklyBatch = weekly_batches::table.find(week).first(conn)?;

    let winning_voters: Vec<Uuid> = votes::table
        .filter(votes::idea_id.eq(winner.id))
        .select(votes::user_id)
        .load(conn)?;

    let badges: Vec<NewUserBadge> = winning_voters
        .iter()
        .map(|user_id| NewUserBadge {
            user_id: *user_id,
            idea_id: winner.id,
            badge_type: BADGE_WINNING_PICK.to_string(),
        })
        .collect();

    if !badges.is_empty() {
        diesel::insert_into(user_badges::table)
            .values(&badges)
            .on_conflict((user_badges::user_id, user_badges::idea_id))
            .do_nothing()
            .execute(conn)?;
        info!(count = badges.len(), "awarded winning-pick badges");
    }

    Ok(Some(WinnerReport {
        winner: winner.clone(),
        batch,
        badge_count: winning_voters.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::select_winner;

    #[test]
    fn unique_maximum_wins_regardless_of_order() {
        assert_eq!(select_winner(&[("a", 5), ("b", 9), ("c", 2)]), Some(1));
        assert_eq!(select_winner(&[("b", 9), ("a", 5), ("c", 2)]), Some(0));
        assert_eq!(select_winner(&[("c", 2), ("a", 5), ("b", 9)]), Some(2));
    }

    #[test]
    fn ties_go_to_the_first_listed_idea() {
        assert_eq!(select_winner(&[("a", 4), ("b", 4), ("c", 1)]), Some(0));
        assert_eq!(select_winner(&[("c", 1), ("b", 4), ("a", 4)]), Some(1));
    }

    #[test]
    fn empty_tally_has_no_winner() {
        assert_eq!(select_winner::<&str>(&[]), None);
    }

    #[test]
    fn zero_votes_still_selects_the_first_idea() {
        assert_eq!(select_winner(&[("a", 0), ("b", 0)]), Some(0));
    }
}
