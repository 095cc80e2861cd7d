//! Weekly digest: render one base document, personalize per recipient, and
//! fan the sends out without letting one bad address block the rest.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use diesel::prelude::*;
use futures_util::future::join_all;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tokio::task;
use tracing::{info, warn};

use crate::clients::mailer::OutboundEmail;
use crate::emails;
use crate::models::{Idea, STATUS_PUBLISHED};
use crate::schema::{ideas, user_badges, weekly_batches};
use crate::state::AppState;
use crate::subscribers::{build_distribution_list, unsubscribe_token, Recipient};

#[derive(Debug)]
pub struct DigestReport {
    pub recipients: usize,
    pub sent: usize,
    pub ideas: usize,
}

struct DigestInputs {
    week_ideas: Vec<Idea>,
    winner: Option<(Idea, usize)>,
    thread_count: i32,
    recipients: Vec<Recipient>,
}

/// Composes and dispatches the digest for the given week. Individual send
/// failures are logged and counted, never propagated; the batch waits for
/// every attempt before stamping `email_sent_at`.
pub async fn compose_and_send(state: Arc<AppState>, week: NaiveDate) -> Result<DigestReport> {
    let load_state = state.clone();
    let inputs = task::spawn_blocking(move || load_inputs(load_state, week))
        .await
        .context("digest load task panicked")??;

    if inputs.week_ideas.is_empty() {
        info!(%week, "no published ideas, skipping digest");
        return Ok(DigestReport {
            recipients: 0,
            sent: 0,
            ideas: 0,
        });
    }

    let base_html = emails::weekly_digest(
        &inputs.week_ideas,
        inputs
            .winner
            .as_ref()
            .map(|(idea, badges)| (idea, *badges)),
        inputs.thread_count,
        week,
        &state.config.frontend_url,
    );
    let subject = format!("Weekly Ideas: Week of {}", emails::short_date(week));

    info!(
        recipients = inputs.recipients.len(),
        ideas = inputs.week_ideas.len(),
        "dispatching weekly digest"
    );

    let sends = inputs.recipients.iter().map(|recipient| {
        let email = personalize(&state, &base_html, &subject, recipient);
        let mailer = state.mailer.clone();
        async move {
            match mailer.send(&email).await {
                Ok(()) => true,
                Err(err) => {
                    warn!(to = %email.to, error = %err, "digest send failed");
                    false
                }
            }
        }
    });

    let results = join_all(sends).await;
    let sent = results.iter().filter(|ok| **ok).count();

    let stamp_state = state.clone();
    task::spawn_blocking(move || stamp_sent(stamp_state, week))
        .await
        .context("digest stamp task panicked")??;

    info!(sent, total = results.len(), "weekly digest dispatched");
    Ok(DigestReport {
        recipients: results.len(),
        sent,
        ideas: inputs.week_ideas.len(),
    })
}

fn personalize(
    state: &AppState,
    base_html: &str,
    subject: &str,
    recipient: &Recipient,
) -> OutboundEmail {
    let token = unsubscribe_token(&recipient.email);
    let html = base_html
        .replace("{{email}}", &recipient.email)
        .replace("{{token}}", &token);
    let unsubscribe_url = format!(
        "{}/unsubscribe?email={}&token={}",
        state.config.frontend_url,
        utf8_percent_encode(&recipient.email, NON_ALPHANUMERIC),
        token
    );

    OutboundEmail {
        to: recipient.email.clone(),
        subject: subject.to_string(),
        html,
        headers: vec![
            (
                "List-Unsubscribe".to_string(),
                format!("<{unsubscribe_url}>"),
            ),
            (
                "List-Unsubscribe-Post".to_string(),
                "List-Unsubscribe=One-Click".to_string(),
            ),
        ],
    }
}

fn load_inputs(state: Arc<AppState>, week: NaiveDate) -> Result<DigestInputs> {
    let mut conn = state.db().map_err(|err| anyhow!("{err:?}"))?;

    let week_ideas: Vec<Idea> = ideas::table
        .filter(ideas::week_published.eq(week))
        .filter(ideas::status.eq(STATUS_PUBLISHED))
        .order(ideas::created_at.asc())
        .load(&mut conn)?;

    let last_week = week - Duration::days(7);
    let winner_id: Option<uuid::Uuid> = weekly_batches::table
        .find(last_week)
        .select(weekly_batches::winner_idea_id)
        .first(&mut conn)
        .optional()?
        .flatten();
    let winner = match winner_id {
        Some(id) => {
            let idea: Idea = ideas::table.find(id).first(&mut conn)?;
            let badges: i64 = user_badges::table
                .filter(user_badges::idea_id.eq(id))
                .count()
                .get_result(&mut conn)?;
            Some((idea, badges as usize))
        }
        None => None,
    };

    let thread_count: i32 = weekly_batches::table
        .find(week)
        .select(weekly_batches::posts_scraped)
        .first(&mut conn)
        .optional()?
        .filter(|count| *count > 0)
        .unwrap_or(week_ideas.len() as i32);

    let recipients = build_distribution_list(&mut conn)?;

    Ok(DigestInputs {
        week_ideas,
        winner,
        thread_count,
        recipients,
    })
}

fn stamp_sent(state: Arc<AppState>, week: NaiveDate) -> Result<()> {
    let mut conn = state.db().map_err(|err| anyhow!("{err:?}"))?;
    let now = Utc::now().naive_utc();
    diesel::insert_into(weekly_batches::table)
        .values((
            weekly_batches::week_start_date.eq(week),
            weekly_batches::email_sent_at.eq(Some(now)),
        ))
        .on_conflict(weekly_batches::week_start_date)
        .do_update()
        .set((
            weekly_batches::email_sent_at.eq(Some(now)),
            weekly_batches::updated_at.eq(now),
        ))
        .execute(&mut conn)?;
    Ok(())
}
