use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::Deserialize;
use tokio::task;
use tracing::{error, info};

use crate::{
    digest, jobs::JOB_WEEKLY_PUBLISH, models::Job, state::AppState, store, week::week_start,
    winner,
};

use super::{JobExecution, JobHandler};

#[derive(Debug, Deserialize)]
struct PublishPayload {
    #[serde(default)]
    week: Option<NaiveDate>,
}

/// Monday cycle: publish the new week's ideas, settle last week's winner,
/// then send the digest. Each stage is caught on its own so a broken stage
/// never blocks the ones after it.
pub struct WeeklyPublishJob;

impl WeeklyPublishJob {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl JobHandler for WeeklyPublishJob {
    fn job_type(&self) -> &'static str {
        JOB_WEEKLY_PUBLISH
    }

    async fn handle(&self, state: Arc<AppState>, job: Job) -> JobExecution {
        let payload: PublishPayload = match serde_json::from_value(job.payload.clone()) {
            Ok(payload) => payload,
            Err(err) => {
                return JobExecution::Failed {
                    error: format!("invalid publish payload: {err}"),
                }
            }
        };
        let week = payload
            .week
            .unwrap_or_else(|| week_start(Utc::now().date_naive()));
        let previous_week = week - ChronoDuration::days(7);

        let publish_state = state.clone();
        let publish_result = task::spawn_blocking(move || {
            let mut conn = publish_state.db().map_err(|err| format!("{err:?}"))?;
            store::auto_publish(&mut conn, week).map_err(|err| format!("{err:?}"))
        })
        .await;
        match publish_result {
            Ok(Ok(published)) => {
                info!(published = published.len(), %week, "weekly publish complete")
            }
            Ok(Err(err)) => error!(error = %err, %week, "weekly publish stage failed"),
            Err(join_err) => error!(error = %join_err, "publish stage panicked"),
        }

        let winner_state = state.clone();
        let winner_result = task::spawn_blocking(move || {
            let mut conn = winner_state.db().map_err(|err| format!("{err:?}"))?;
            winner::compute_winner(&mut conn, previous_week).map_err(|err| format!("{err:?}"))
        })
        .await;
        match winner_result {
            Ok(Ok(Some(report))) => info!(
                winner = %report.winner.id,
                badges = report.badge_count,
                week = %previous_week,
                "weekly winner settled"
            ),
            Ok(Ok(None)) => info!(week = %previous_week, "no published ideas, winner skipped"),
            Ok(Err(err)) => error!(error = %err, week = %previous_week, "winner stage failed"),
            Err(join_err) => error!(error = %join_err, "winner stage panicked"),
        }

        match digest::compose_and_send(state.clone(), week).await {
            Ok(report) => info!(
                sent = report.sent,
                recipients = report.recipients,
                %week,
                "digest stage complete"
            ),
            Err(err) => error!(error = %err, %week, "digest stage failed"),
        }

        JobExecution::Success
    }
}
