//! Fixed weekly triggers. The loop sleeps until the next configured slot,
//! enqueues the matching job, and goes back to sleep; the worker does the
//! actual work so a crash mid-run never loses the trigger.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use serde_json::json;
use tokio::task;
use tracing::{error, info};

use crate::jobs::{enqueue_job, JOB_SCRAPE_IDEAS, JOB_WEEKLY_PUBLISH};
use crate::state::AppState;
use crate::week::week_start;

/// First top-of-the-hour slot for `weekday` at `hour` UTC strictly after `after`.
fn next_occurrence(after: DateTime<Utc>, weekday: Weekday, hour: u32) -> DateTime<Utc> {
    let days_ahead =
        (weekday.num_days_from_monday() + 7 - after.weekday().num_days_from_monday()) % 7;
    let day = after.date_naive() + Duration::days(i64::from(days_ahead));
    let candidate = day
        .and_hms_opt(hour, 0, 0)
        .unwrap_or_else(|| day.and_time(chrono::NaiveTime::MIN))
        .and_utc();
    if candidate <= after {
        candidate + Duration::days(7)
    } else {
        candidate
    }
}

pub async fn run(state: Arc<AppState>) {
    info!(
        scrape = %format!("{:?} {:02}:00 UTC", state.config.scrape_weekday, state.config.scrape_hour_utc),
        publish = %format!("{:?} {:02}:00 UTC", state.config.publish_weekday, state.config.publish_hour_utc),
        "scheduler started"
    );

    loop {
        let now = Utc::now();
        let next_scrape =
            next_occurrence(now, state.config.scrape_weekday, state.config.scrape_hour_utc);
        let next_publish = next_occurrence(
            now,
            state.config.publish_weekday,
            state.config.publish_hour_utc,
        );
        let fire_at = next_scrape.min(next_publish);

        let wait = (fire_at - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        info!(fire_at = %fire_at, "scheduler sleeping until next trigger");
        tokio::time::sleep(wait).await;

        if fire_at == next_scrape {
            if let Err(err) = trigger(state.clone(), JOB_SCRAPE_IDEAS, fire_at).await {
                error!(error = %err, "failed to enqueue scrape job");
            }
        }
        if fire_at == next_publish {
            if let Err(err) = trigger(state.clone(), JOB_WEEKLY_PUBLISH, fire_at).await {
                error!(error = %err, "failed to enqueue publish job");
            }
        }
    }
}

async fn trigger(state: Arc<AppState>, job_type: &'static str, fire_at: DateTime<Utc>) -> Result<()> {
    // The scrape collects material for the upcoming week; publish, winner and
    // digest all operate on the week that starts the day the trigger fires.
    let week = match job_type {
        JOB_SCRAPE_IDEAS => week_start(fire_at.date_naive() + Duration::days(7)),
        _ => week_start(fire_at.date_naive()),
    };
    let payload = json!({ "week": week });

    task::spawn_blocking(move || {
        let mut conn = state.db().map_err(|err| anyhow!("{err:?}"))?;
        let job = enqueue_job(&mut conn, job_type, payload, None)?;
        info!(job_id = %job.id, job_type, %week, "scheduled job enqueued");
        Ok::<(), anyhow::Error>(())
    })
    .await
    .context("scheduler enqueue task panicked")?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn next_occurrence_later_same_day() {
        // 2025-06-08 is a Sunday.
        let now = utc(2025, 6, 8, 8, 30);
        assert_eq!(
            next_occurrence(now, Weekday::Sun, 10),
            utc(2025, 6, 8, 10, 0)
        );
    }

    #[test]
    fn next_occurrence_rolls_to_next_week_when_passed() {
        let now = utc(2025, 6, 8, 10, 0);
        assert_eq!(
            next_occurrence(now, Weekday::Sun, 10),
            utc(2025, 6, 15, 10, 0)
        );
    }

    #[test]
    fn next_occurrence_crosses_into_next_weekday() {
        let now = utc(2025, 6, 8, 11, 0);
        assert_eq!(
            next_occurrence(now, Weekday::Mon, 9),
            utc(2025, 6, 9, 9, 0)
        );
    }

    #[test]
    fn scrape_week_targets_upcoming_monday() {
        // Fired Sunday 2025-06-08; material is for the week of Monday 06-09.
        let fire = utc(2025, 6, 8, 10, 0);
        assert_eq!(
            week_start(fire.date_naive() + Duration::days(7)),
            chrono::NaiveDate::from_ymd_opt(2025, 6, 9).unwrap()
        );
    }
}
