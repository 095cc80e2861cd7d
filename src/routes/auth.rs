use axum::{
    extract::{Query, State},
    Json,
};
use diesel::prelude::*;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use crate::clients::mailer::OutboundEmail;
use crate::emails;
use crate::error::{AppError, AppResult};
use crate::models::NewAccount;
use crate::schema::accounts;
use crate::state::AppState;
use crate::subscribers;

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct UnsubscribeQuery {
    pub email: String,
    pub token: String,
}

fn normalized_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_ascii_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::bad_request("a valid email address is required"));
    }
    Ok(email)
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> AppResult<Json<Value>> {
    let email = normalized_email(&payload.email)?;
    let name = payload.name.as_deref().map(str::trim).filter(|n| !n.is_empty());

    let mut conn = state.db()?;
    subscribers::subscribe(&mut conn, &email, name)?;
    drop(conn);

    // Welcome email is best-effort; the subscription stands either way.
    let mailer = state.mailer.clone();
    let welcome = OutboundEmail {
        to: email.clone(),
        subject: "Welcome aboard".to_string(),
        html: emails::welcome(name),
        headers: Vec::new(),
    };
    tokio::spawn(async move {
        if let Err(err) = mailer.send(&welcome).await {
            warn!(to = %welcome.to, error = %err, "welcome email failed");
        }
    });

    Ok(Json(json!({ "subscribed": true })))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SubscribeRequest>,
) -> AppResult<Json<Value>> {
    let email = normalized_email(&payload.email)?;
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    let mut conn = state.db()?;
    let account = NewAccount {
        id: Uuid::new_v4(),
        email: email.clone(),
        display_name: name,
    };
    diesel::insert_into(accounts::table)
        .values(&account)
        .on_conflict(accounts::email)
        .do_update()
        .set(accounts::display_name.eq(&account.display_name))
        .execute(&mut conn)?;
    drop(conn);

    // The hosted auth provider completes the passwordless flow from this page.
    let action_link = format!("{}/login", state.config.frontend_url);
    let mailer = state.mailer.clone();
    let login = OutboundEmail {
        to: email,
        subject: "Your sign-in link".to_string(),
        html: emails::login_link(&action_link),
        headers: Vec::new(),
    };
    tokio::spawn(async move {
        if let Err(err) = mailer.send(&login).await {
            warn!(to = %login.to, error = %err, "login link email failed");
        }
    });

    Ok(Json(json!({ "ok": true })))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Query(query): Query<UnsubscribeQuery>,
) -> AppResult<Json<Value>> {
    // The token was minted from the stored address verbatim, so no case
    // normalization here.
    let email = query.email.trim().to_string();
    if email.is_empty() || !subscribers::verify_unsubscribe_token(&email, &query.token) {
        return Err(AppError::bad_request("invalid unsubscribe token"));
    }

    let mut conn = state.db()?;
    subscribers::unsubscribe(&mut conn, &email)?;
    Ok(Json(json!({ "unsubscribed": true })))
}
