//! Persistence operations for idea records and weekly batch bookkeeping.

use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::diversity;
use crate::models::{Idea, NewIdea, STATUS_APPROVED, STATUS_PENDING, STATUS_PUBLISHED};
use crate::schema::{ideas, weekly_batches};
use crate::synthesize::IdeaDraft;

/// Allow-listed moderation edit. Anything outside these fields is ignored at
/// the route boundary by construction.
#[derive(Debug, Default, Deserialize, AsChangeset)]
#[diesel(table_name = ideas)]
pub struct IdeaPatch {
    pub name: Option<String>,
    pub title: Option<String>,
    pub problem: Option<String>,
    pub solution: Option<String>,
    pub target_audience: Option<String>,
    pub why_it_matters: Option<String>,
    pub tags: Option<Value>,
}

pub fn list_by_status(conn: &mut PgConnection, status: &str) -> QueryResult<Vec<Idea>> {
    ideas::table
        .filter(ideas::status.eq(status))
        .order(ideas::created_at.asc())
        .load(conn)
}

pub fn list_by_week(
    conn: &mut PgConnection,
    week: NaiveDate,
    status: Option<&str>,
) -> QueryResult<Vec<Idea>> {
    let mut query = ideas::table
        .filter(ideas::week_published.eq(week))
        .order(ideas::created_at.asc())
        .into_boxed();
    if let Some(status) = status {
        query = query.filter(ideas::status.eq(status));
    }
    query.load(conn)
}

pub fn get_by_id(conn: &mut PgConnection, id: Uuid) -> QueryResult<Idea> {
    ideas::table.find(id).first(conn)
}

pub fn find_by_id(conn: &mut PgConnection, id: Uuid) -> QueryResult<Option<Idea>> {
    ideas::table.find(id).first(conn).optional()
}

pub fn find_published(conn: &mut PgConnection, id: Uuid) -> QueryResult<Option<Idea>> {
    ideas::table
        .find(id)
        .filter(ideas::status.eq(STATUS_PUBLISHED))
        .first(conn)
        .optional()
}

pub fn list_published(conn: &mut PgConnection) -> QueryResult<Vec<Idea>> {
    ideas::table
        .filter(ideas::status.eq(STATUS_PUBLISHED))
        .order(ideas::week_published.desc())
        .load(conn)
}

/// Keyword fingerprints of the most recently published ideas, newest first,
/// for the diversity comparison window.
pub fn recent_fingerprints(conn: &mut PgConnection) -> QueryResult<Vec<Vec<String>>> {
    let rows: Vec<Value> = ideas::table
        .filter(ideas::status.eq(STATUS_PUBLISHED))
        .order(ideas::created_at.desc())
        .limit(diversity::RECENT_WINDOW as i64)
        .select(ideas::problem_keywords)
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|value| {
            serde_json::from_value::<Vec<String>>(value).unwrap_or_default()
        })
        .collect())
}

/// Inserts one draft as a pending idea for the given week, annotated with its
/// keyword fingerprint and, when it overlaps a recent idea, an advisory
/// similarity warning in the moderation notes.
pub fn insert_draft(
    conn: &mut PgConnection,
    draft: &IdeaDraft,
    week: NaiveDate,
    batch_id: &str,
    recent: &[Vec<String>],
) -> QueryResult<Idea> {
    let keywords = diversity::keywords(&draft.problem);
    let warning = diversity::similarity_warning(&keywords, recent);

    let tags = draft.tags.clone().unwrap_or_else(|| {
        json!({
            "region": draft.region.clone().unwrap_or_default(),
            "category": draft.category.clone().unwrap_or_default(),
        })
    });

    let new_idea = NewIdea {
        id: Uuid::new_v4(),
        name: draft.name.clone(),
        title: draft.title.clone().unwrap_or_else(|| draft.name.clone()),
        problem: draft.problem.clone(),
        solution: draft.solution.clone(),
        target_audience: draft.target.clone().unwrap_or_default(),
        why_it_matters: draft.why.clone().unwrap_or_default(),
        tags,
        source_links: json!(draft.source_links),
        week_published: week,
        status: STATUS_PENDING.to_string(),
        moderation_notes: warning,
        problem_keywords: json!(keywords),
        batch_id: Some(batch_id.to_string()),
    };

    diesel::insert_into(ideas::table)
        .values(&new_idea)
        .execute(conn)?;

    ideas::table.find(new_idea.id).first(conn)
}

pub fn update_status(
    conn: &mut PgConnection,
    id: Uuid,
    status: &str,
    moderator: &str,
    notes: Option<&str>,
) -> QueryResult<Idea> {
    let now = Utc::now().naive_utc();
    // Approvals leave any existing notes (e.g. a similarity warning) intact.
    if let Some(notes) = notes {
        diesel::update(ideas::table.find(id))
            .set((
                ideas::status.eq(status),
                ideas::moderated_at.eq(Some(now)),
                ideas::moderated_by.eq(Some(moderator)),
                ideas::moderation_notes.eq(Some(notes)),
                ideas::updated_at.eq(now),
            ))
            .execute(conn)?;
    } else {
        diesel::update(ideas::table.find(id))
            .set((
                ideas::status.eq(status),
                ideas::moderated_at.eq(Some(now)),
                ideas::moderated_by.eq(Some(moderator)),
                ideas::updated_at.eq(now),
            ))
            .execute(conn)?;
    }

    ideas::table.find(id).first(conn)
}

pub fn update_fields(conn: &mut PgConnection, id: Uuid, patch: &IdeaPatch) -> QueryResult<Idea> {
    // All-None patches would produce an empty changeset, which diesel rejects.
    diesel::update(ideas::table.find(id))
        .set((patch, ideas::updated_at.eq(Utc::now().naive_utc())))
        .execute(conn)?;

    ideas::table.find(id).first(conn)
}

/// Transitions every approved idea of the week to published. Idempotent:
/// once nothing is left approved, the affected set is empty.
pub fn bulk_publish(conn: &mut PgConnection, week: NaiveDate) -> QueryResult<Vec<Idea>> {
    publish_with_status(conn, week, STATUS_APPROVED)
}

/// Scheduler policy: un-moderated (still pending) ideas for the target week
/// are published directly when the cycle fires.
pub fn auto_publish(conn: &mut PgConnection, week: NaiveDate) -> QueryResult<Vec<Idea>> {
    publish_with_status(conn, week, STATUS_PENDING)
}

fn publish_with_status(
    conn: &mut PgConnection,
    week: NaiveDate,
    from_status: &str,
) -> QueryResult<Vec<Idea>> {
    diesel::update(
        ideas::table
            .filter(ideas::week_published.eq(week))
            .filter(ideas::status.eq(from_status)),
    )
    .set((
        ideas::status.eq(STATUS_PUBLISHED),
        ideas::updated_at.eq(Utc::now().naive_utc()),
    ))
    .get_results(conn)
}

/// Records scrape-side counters on the week's batch row, creating it if this
/// is the first touch of the week.
pub fn upsert_batch_counts(
    conn: &mut PgConnection,
    week: NaiveDate,
    total_ideas: i32,
    posts_scraped: i32,
) -> QueryResult<()> {
    let now = Utc::now().naive_utc();
    diesel::insert_into(weekly_batches::table)
        .values((
            weekly_batches::week_start_date.eq(week),
            weekly_batches::total_ideas.eq(total_ideas),
            weekly_batches::posts_scraped.eq(posts_scraped),
        ))
        .on_conflict(weekly_batches::week_start_date)
        .do_update()
        .set((
            weekly_batches::total_ideas.eq(total_ideas),
            weekly_batches::posts_scraped.eq(posts_scraped),
            weekly_batches::updated_at.eq(now),
        ))
        .execute(conn)?;
    Ok(())
}
