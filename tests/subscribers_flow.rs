mod common;

use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, TestApp};
use diesel::prelude::*;
use serde_json::json;
use zeroweek::subscribers::{build_distribution_list, unsubscribe_token};

async fn wait_for_send(app: &TestApp, to: &str) -> Result<bool> {
    // Welcome mail is dispatched on a detached task.
    for _ in 0..20 {
        if !app.mailer().sent_to(to).await.is_empty() {
            return Ok(true);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Ok(false)
}

#[tokio::test]
async fn subscribe_records_row_and_sends_welcome() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app
        .post_json(
            "/api/auth/subscribe",
            &json!({ "email": "Reader@Example.com", "name": "Reader" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let row: Option<(String, Option<chrono::NaiveDateTime>)> = app
        .with_conn(|conn| {
            use zeroweek::schema::subscribers;
            Ok(subscribers::table
                .select((subscribers::email, subscribers::unsubscribed_at))
                .first(conn)
                .optional()?)
        })
        .await?;
    let (email, unsubscribed_at) = row.expect("subscriber row inserted");
    assert_eq!(email, "reader@example.com");
    assert!(unsubscribed_at.is_none());

    assert!(wait_for_send(&app, "reader@example.com").await?);

    let response = app
        .post_json("/api/auth/subscribe", &json!({ "email": "not-an-email" }), None)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn unsubscribe_requires_matching_token() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    let response = app
        .post_json(
            "/api/auth/subscribe",
            &json!({ "email": "leaver@example.com" }),
            None,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .get_with_headers(
            "/api/auth/unsubscribe?email=leaver@example.com&token=bogus",
            &[],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let token = unsubscribe_token("leaver@example.com");
    let response = app
        .get_with_headers(
            &format!("/api/auth/unsubscribe?email=leaver@example.com&token={token}"),
            &[],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let unsubscribed: Option<chrono::NaiveDateTime> = app
        .with_conn(|conn| {
            use zeroweek::schema::subscribers;
            Ok(subscribers::table
                .find("leaver@example.com")
                .select(subscribers::unsubscribed_at)
                .first(conn)?)
        })
        .await?;
    assert!(unsubscribed.is_some());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn distribution_list_prefers_accounts_and_honors_suppression() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;

    app.insert_account("member@example.com", Some("Member")).await?;
    app.post_json(
        "/api/auth/subscribe",
        &json!({ "email": "fan@example.com" }),
        None,
    )
    .await?;
    // A subscriber row for an address that also has an account must not
    // produce a duplicate recipient.
    app.post_json(
        "/api/auth/subscribe",
        &json!({ "email": "member@example.com" }),
        None,
    )
    .await?;

    let list = app
        .with_conn(|conn| Ok(build_distribution_list(conn)?))
        .await?;
    let mut emails: Vec<String> = list.iter().map(|r| r.email.clone()).collect();
    emails.sort();
    assert_eq!(emails, vec!["fan@example.com", "member@example.com"]);

    // Suppression applies to auth accounts too; the subscribers table doubles
    // as the suppression list.
    let token = unsubscribe_token("member@example.com");
    let response = app
        .get_with_headers(
            &format!("/api/auth/unsubscribe?email=member@example.com&token={token}"),
            &[],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let list = app
        .with_conn(|conn| Ok(build_distribution_list(conn)?))
        .await?;
    let emails: Vec<String> = list.iter().map(|r| r.email.clone()).collect();
    assert_eq!(emails, vec!["fan@example.com"]);

    // Re-subscribing clears the suppression.
    app.post_json(
        "/api/auth/subscribe",
        &json!({ "email": "member@example.com" }),
        None,
    )
    .await?;
    let list = app
        .with_conn(|conn| Ok(build_distribution_list(conn)?))
        .await?;
    assert_eq!(list.len(), 2);

    app.cleanup().await?;
    Ok(())
}
