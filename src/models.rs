use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::*;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_APPROVED: &str = "approved";
pub const STATUS_REJECTED: &str = "rejected";
pub const STATUS_PUBLISHED: &str = "published";

pub const BADGE_WINNING_PICK: &str = "winning_pick";

#[derive(Debug, Clone, Queryable, Identifiable, Serialize)]
#[diesel(table_name = ideas)]
pub struct Idea {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub target_audience: String,
    pub why_it_matters: String,
    pub tags: serde_json::Value,
    pub source_links: serde_json::Value,
    pub week_published: NaiveDate,
    pub status: String,
    pub moderated_at: Option<NaiveDateTime>,
    pub moderated_by: Option<String>,
    pub moderation_notes: Option<String>,
    pub problem_keywords: serde_json::Value,
    pub batch_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = ideas)]
pub struct NewIdea {
    pub id: Uuid,
    pub name: String,
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub target_audience: String,
    pub why_it_matters: String,
    pub tags: serde_json::Value,
    pub source_links: serde_json::Value,
    pub week_published: NaiveDate,
    pub status: String,
    pub moderation_notes: Option<String>,
    pub problem_keywords: serde_json::Value,
    pub batch_id: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations, Serialize)]
#[diesel(table_name = votes)]
#[diesel(belongs_to(Idea))]
pub struct Vote {
    pub id: Uuid,
    pub idea_id: Uuid,
    pub user_id: Uuid,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = votes)]
pub struct NewVote {
    pub id: Uuid,
    pub idea_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = weekly_batches)]
pub struct WeeklyBatch {
    pub week_start_date: NaiveDate,
    pub winner_idea_id: Option<Uuid>,
    pub total_ideas: i32,
    pub total_votes: i32,
    pub posts_scraped: i32,
    pub email_sent_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Associations, Serialize)]
#[diesel(table_name = user_badges)]
#[diesel(belongs_to(Idea))]
#[diesel(primary_key(user_id, idea_id))]
pub struct UserBadge {
    pub user_id: Uuid,
    pub idea_id: Uuid,
    pub badge_type: String,
    pub awarded_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = user_badges)]
pub struct NewUserBadge {
    pub user_id: Uuid,
    pub idea_id: Uuid,
    pub badge_type: String,
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = subscribers)]
pub struct Subscriber {
    pub email: String,
    pub name: Option<String>,
    pub subscribed_at: NaiveDateTime,
    pub unsubscribed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = accounts)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = accounts)]
pub struct NewAccount {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub run_after: NaiveDateTime,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub run_after: NaiveDateTime,
}
