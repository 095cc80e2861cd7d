use std::{env, sync::Arc};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde_json::json;

use zeroweek::{
    auth::jwt::JwtService,
    clients::{generation::GeminiClient, mailer::ResendMailer},
    config::AppConfig,
    db, digest,
    jobs::{enqueue_job, JOB_SCRAPE_IDEAS, JOB_WEEKLY_PUBLISH},
    state::AppState,
    week::{previous_week_start, week_start},
    winner,
};

const USAGE: &str = "Usage: pipeline <scrape|publish|winner|digest> [YYYY-MM-DD]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let mut args = env::args().skip(1);
    let command = args.next();
    let week = match args.next() {
        Some(raw) => Some(
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .context("week must be formatted YYYY-MM-DD")?,
        ),
        None => None,
    };

    match command.as_deref() {
        Some("scrape") => enqueue(JOB_SCRAPE_IDEAS, week)?,
        Some("publish") => enqueue(JOB_WEEKLY_PUBLISH, week)?,
        Some("winner") => run_winner(week)?,
        Some("digest") => run_digest(week).await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

/// Queues the stage for the resident worker instead of running it inline, so
/// an operator kick and a scheduled kick follow the same path.
fn enqueue(job_type: &str, week: Option<NaiveDate>) -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let payload = match week {
        Some(week) => json!({ "week": week_start(week) }),
        None => json!({}),
    };
    let job = enqueue_job(&mut conn, job_type, payload, None)?;
    println!("Enqueued {job_type} job {}.", job.id);
    Ok(())
}

fn run_winner(week: Option<NaiveDate>) -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let week = week.map(week_start).unwrap_or_else(previous_week_start);
    match winner::compute_winner(&mut conn, week)? {
        Some(report) => println!(
            "Winner for week of {week}: \"{}\" with {} votes ({} badges awarded).",
            report.winner.title, report.batch.total_votes, report.badge_count
        ),
        None => println!("No published ideas for week of {week}."),
    }
    Ok(())
}

async fn run_digest(week: Option<NaiveDate>) -> Result<()> {
    let config = AppConfig::from_env()?;
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let http = reqwest::Client::new();
    let generator = Arc::new(GeminiClient::new(
        http.clone(),
        config.generation_api_key.clone(),
    ));
    let mailer = Arc::new(ResendMailer::new(
        http.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
        config.mail_reply_to.clone(),
    ));
    let jwt = JwtService::from_config(&config);
    let state = Arc::new(AppState::new(pool, config, mailer, generator, http, jwt));

    let week = week
        .map(week_start)
        .unwrap_or_else(|| week_start(Utc::now().date_naive()));
    let report = digest::compose_and_send(state, week).await?;
    println!(
        "Digest for week of {week}: {} of {} sends succeeded ({} ideas).",
        report.sent, report.recipients, report.ideas
    );
    Ok(())
}
