mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_to_vec, TestApp};
use serde_json::Value;
use zeroweek::models::{STATUS_PENDING, STATUS_PUBLISHED, STATUS_REJECTED};
use zeroweek::store;
use zeroweek::week::{current_week_start, previous_week_start};
use zeroweek::winner::compute_winner;

#[tokio::test]
async fn unpublished_ideas_are_invisible_to_the_public_detail_endpoint() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let week = current_week_start();
    let pending = app.insert_idea("Pending Idea", week, STATUS_PENDING).await?;
    let rejected = app.insert_idea("Rejected Idea", week, STATUS_REJECTED).await?;
    let published = app.insert_idea("Published Idea", week, STATUS_PUBLISHED).await?;

    let response = app.get(&format!("/api/ideas/{pending}"), None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get(&format!("/api/ideas/{rejected}"), None).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get(&format!("/api/ideas/{published}"), None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(body["name"], "Published Idea");
    assert_eq!(body["votes"], 0);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn weekly_listing_carries_the_week_start_date() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let week = current_week_start();
    app.insert_idea("Live Idea", week, STATUS_PUBLISHED).await?;
    app.insert_idea("Still Pending", week, STATUS_PENDING).await?;

    let response = app.get("/api/ideas/weekly", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(body["weekStart"], week.to_string());
    let ideas = body["ideas"].as_array().expect("ideas array");
    assert_eq!(ideas.len(), 1);
    assert_eq!(ideas[0]["name"], "Live Idea");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn batch_history_embeds_the_winner_record() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let last_week = previous_week_start();
    app.insert_idea("Champion", last_week, STATUS_PUBLISHED).await?;
    app.with_conn(move |conn| Ok(compute_winner(conn, last_week)?))
        .await?
        .expect("a winner should be selected");

    // A batch that has not been settled yet has no winner to embed.
    let this_week = current_week_start();
    app.with_conn(move |conn| Ok(store::upsert_batch_counts(conn, this_week, 0, 40)?))
        .await?;

    let response = app.get("/api/ideas/weekly-batches", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let batches: Vec<Value> = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(batches.len(), 2);

    assert_eq!(batches[0]["week_start_date"], this_week.to_string());
    assert!(batches[0]["winner"].is_null());

    assert_eq!(batches[1]["week_start_date"], last_week.to_string());
    assert_eq!(batches[1]["winner"]["name"], "Champion");

    app.cleanup().await?;
    Ok(())
}
