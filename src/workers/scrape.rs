use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::Deserialize;
use tokio::task;
use tracing::{error, info, warn};

use crate::{
    clients::mailer::OutboundEmail,
    emails,
    jobs::JOB_SCRAPE_IDEAS,
    models::Job,
    scrape::{scrape_all, SOURCE_CHANNELS},
    state::AppState,
    store,
    synthesize::{synthesize_ideas, IdeaDraft},
    week::week_start,
};

use super::{JobExecution, JobHandler};

#[derive(Debug, Deserialize)]
struct ScrapePayload {
    #[serde(default)]
    week: Option<NaiveDate>,
}

pub struct ScrapeIdeasJob;

impl ScrapeIdeasJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for ScrapeIdeasJob {
    fn job_type(&self) -> &'static str {
        JOB_SCRAPE_IDEAS
    }

    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution {
        let payload: ScrapePayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid scrape payload: {err}"),
                }
            }
        };
        // An ad-hoc run without a week still targets the upcoming Monday.
        let week = payload
            .week
            .unwrap_or_else(|| week_start(Utc::now().date_naive() + ChronoDuration::days(7)));

        let posts = scrape_all(&state.http, SOURCE_CHANNELS).await;
        info!(posts = posts.len(), %week, "scrape pass finished");

        let drafts = synthesize_ideas(
            state.generator.as_ref(),
            &state.config.generation_model_primary,
            &state.config.generation_model_backup,
            &posts,
        )
        .await;

        if drafts.is_empty() {
            info!(%week, "no drafts produced this cycle");
            return JobExecution::Success;
        }

        let posts_scraped = posts.len() as i32;
        let state_clone = state.clone();
        let stored = drafts.clone();
        match task::spawn_blocking(move || persist_drafts(state_clone, stored, week, posts_scraped))
            .await
        {
            Ok(Ok(inserted)) => {
                info!(inserted, %week, "scraped ideas stored for moderation");
                send_admin_report(&state, &drafts, week).await;
                JobExecution::Success
            }
            Ok(Err(err)) => JobExecution::Retry {
                delay: Duration::from_secs(60),
                error: err,
            },
            Err(join_err) => {
                error!(job_id = %job.id, error = %join_err, "scrape persist task panicked");
                JobExecution::Retry {
                    delay: Duration::from_secs(60),
                    error: format!("worker panicked: {join_err}"),
                }
            }
        }
    }
}

/// Mails the stored drafts to the moderation address so new ideas get
/// reviewed before publish day. Skipped when no address is configured; a
/// delivery failure never fails the job.
pub async fn send_admin_report(state: &AppState, drafts: &[IdeaDraft], week: NaiveDate) {
    let Some(admin_email) = state.config.admin_email.as_deref() else {
        return;
    };
    let email = OutboundEmail {
        to: admin_email.to_string(),
        subject: format!("Scrape report: {} new idea drafts", drafts.len()),
        html: emails::admin_report(drafts, week),
        headers: Vec::new(),
    };
    match state.mailer.send(&email).await {
        Ok(()) => info!(to = admin_email, "scrape report sent"),
        Err(err) => warn!(to = admin_email, error = %err, "failed to send scrape report"),
    }
}

fn persist_drafts(
    state: Arc<AppState>,
    drafts: Vec<IdeaDraft>,
    week: NaiveDate,
    posts_scraped: i32,
) -> Result<usize, String> {
    let mut conn = state.db().map_err(|err| format!("{err:?}"))?;

    let recent = store::recent_fingerprints(&mut conn).map_err(|err| format!("{err:?}"))?;
    let batch_id = format!("scrape-{}", Utc::now().timestamp());

    let mut inserted = 0;
    for draft in &drafts {
        match store::insert_draft(&mut conn, draft, week, &batch_id, &recent) {
            Ok(_) => inserted += 1,
            Err(err) => {
                error!(name = %draft.name, error = %err, "failed to store draft");
            }
        }
    }

    store::upsert_batch_counts(&mut conn, week, inserted as i32, posts_scraped)
        .map_err(|err| format!("{err:?}"))?;

    Ok(inserted)
}
