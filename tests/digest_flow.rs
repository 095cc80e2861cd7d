mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{acquire_db_lock, TestApp};
use diesel::prelude::*;
use serde_json::json;
use zeroweek::digest::compose_and_send;
use zeroweek::models::STATUS_PUBLISHED;
use zeroweek::subscribers::unsubscribe_token;
use zeroweek::synthesize::IdeaDraft;
use zeroweek::week::current_week_start;
use zeroweek::workers::scrape::send_admin_report;

#[tokio::test]
async fn digest_fans_out_and_survives_individual_failures() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let week = current_week_start();
    app.insert_idea("Digest One", week, STATUS_PUBLISHED).await?;
    app.insert_idea("Digest Two", week, STATUS_PUBLISHED).await?;

    app.insert_account("alice@example.com", Some("Alice")).await?;
    app.insert_account("bob@example.com", Some("Bob")).await?;
    app.post_json(
        "/api/auth/subscribe",
        &json!({ "email": "carol@example.com" }),
        None,
    )
    .await?;
    // Drain the welcome email before counting digest sends.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let welcome_count = app.mailer().sent().await.len();

    app.mailer().fail_for("bob@example.com").await;

    let state = Arc::new(app.state.clone());
    let report = compose_and_send(state, week).await?;
    assert_eq!(report.recipients, 3);
    assert_eq!(report.sent, 2);
    assert_eq!(report.ideas, 2);

    let sent = app.mailer().sent().await;
    let digests: Vec<_> = sent.iter().skip(welcome_count).collect();
    assert_eq!(digests.len(), 2);
    assert!(digests.iter().all(|msg| msg.to != "bob@example.com"));

    // Personalized unsubscribe token and one-click headers per recipient.
    let alice = digests
        .iter()
        .find(|msg| msg.to == "alice@example.com")
        .expect("alice received the digest");
    assert!(alice.html.contains(&unsubscribe_token("alice@example.com")));
    assert!(alice.html.contains("Digest One"));
    assert!(alice
        .headers
        .iter()
        .any(|(name, _)| name == "List-Unsubscribe"));
    assert!(alice
        .headers
        .iter()
        .any(|(name, value)| name == "List-Unsubscribe-Post" && value.contains("One-Click")));

    // The batch is stamped even though one send bounced.
    let stamped: Option<chrono::NaiveDateTime> = app
        .with_conn(move |conn| {
            use zeroweek::schema::weekly_batches;
            Ok(weekly_batches::table
                .find(week)
                .select(weekly_batches::email_sent_at)
                .first(conn)?)
        })
        .await?;
    assert!(stamped.is_some());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn digest_skips_weeks_without_published_ideas() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_account("alice@example.com", None).await?;

    let week = current_week_start();
    let report = compose_and_send(Arc::new(app.state.clone()), week).await?;
    assert_eq!(report.ideas, 0);
    assert_eq!(report.recipients, 0);
    assert!(app.mailer().sent().await.is_empty());

    let batch_exists: i64 = app
        .with_conn(move |conn| {
            use zeroweek::schema::weekly_batches;
            Ok(weekly_batches::table
                .find(week)
                .count()
                .get_result(conn)?)
        })
        .await?;
    assert_eq!(batch_exists, 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn scrape_report_goes_to_the_moderation_address() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let drafts: Vec<IdeaDraft> = serde_json::from_str(
        r#"[{"name": "Ledgerly", "title": "Bookkeeping bot", "problem": "p", "solution": "s"},
            {"name": "Churnless", "problem": "p2", "solution": "s2"}]"#,
    )?;
    let week = current_week_start();
    send_admin_report(&app.state, &drafts, week).await;

    let sent = app.mailer().sent_to(common::ADMIN_EMAIL).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("2 new idea drafts"));
    assert!(sent[0].html.contains("Ledgerly: Bookkeeping bot"));
    assert!(sent[0].html.contains("Churnless"));

    app.cleanup().await?;
    Ok(())
}
