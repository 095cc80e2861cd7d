//! Mailing-list registry and suppression semantics.
//!
//! The subscribers table doubles as the suppression list: a non-null
//! `unsubscribed_at` blocks digest delivery even for authenticated accounts
//! that never explicitly subscribed.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use diesel::prelude::*;

use crate::models::Account;
use crate::schema::{accounts, subscribers};

/// Reversible, non-secret unsubscribe token: base64 of the raw email.
/// Anyone who knows an address can compute it, which is the accepted
/// trade-off for a one-click unsubscribe link. Never reuse this as an
/// authentication credential.
pub fn unsubscribe_token(email: &str) -> String {
    BASE64.encode(email)
}

pub fn verify_unsubscribe_token(email: &str, token: &str) -> bool {
    token == unsubscribe_token(email)
}

/// Upsert keyed by email. Re-subscribing clears the suppression marker and
/// refreshes the subscription timestamp.
pub fn subscribe(conn: &mut PgConnection, email: &str, name: Option<&str>) -> QueryResult<()> {
    let now = Utc::now().naive_utc();
    diesel::insert_into(subscribers::table)
        .values((
            subscribers::email.eq(email),
            subscribers::name.eq(name),
            subscribers::subscribed_at.eq(now),
            subscribers::unsubscribed_at.eq::<Option<chrono::NaiveDateTime>>(None),
        ))
        .on_conflict(subscribers::email)
        .do_update()
        .set((
            subscribers::name.eq(name),
            subscribers::subscribed_at.eq(now),
            subscribers::unsubscribed_at.eq::<Option<chrono::NaiveDateTime>>(None),
        ))
        .execute(conn)?;
    Ok(())
}

/// Stamps the suppression marker. Emails with no subscriber row (e.g. an
/// authenticated account that only ever received the digest) get a
/// suppression-only row so the marker has somewhere to live.
pub fn unsubscribe(conn: &mut PgConnection, email: &str) -> QueryResult<()> {
    let now = Utc::now().naive_utc();
    let updated = diesel::update(subscribers::table.find(email))
        .set(subscribers::unsubscribed_at.eq(Some(now)))
        .execute(conn)?;

    if updated == 0 {
        diesel::insert_into(subscribers::table)
            .values((
                subscribers::email.eq(email),
                subscribers::unsubscribed_at.eq(Some(now)),
            ))
            .execute(conn)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientKind {
    Auth,
    Subscriber,
}

#[derive(Debug, Clone)]
pub struct Recipient {
    pub email: String,
    pub name: Option<String>,
    pub kind: RecipientKind,
}

/// Merges authenticated accounts with active subscribers (accounts win on
/// collision), then drops every address carrying a suppression marker. The
/// suppression pass runs over the merged list on purpose: it must catch
/// addresses that arrived via the account path too.
pub fn build_distribution_list(conn: &mut PgConnection) -> QueryResult<Vec<Recipient>> {
    let auth_accounts: Vec<Account> = accounts::table.load(conn)?;

    let active_subscribers: Vec<(String, Option<String>)> = subscribers::table
        .filter(subscribers::unsubscribed_at.is_null())
        .select((subscribers::email, subscribers::name))
        .load(conn)?;

    let mut recipients: Vec<Recipient> = Vec::new();
    for account in auth_accounts {
        let name = account
            .display_name
            .clone()
            .or_else(|| account.email.split('@').next().map(|s| s.to_string()));
        recipients.push(Recipient {
            email: account.email,
            name,
            kind: RecipientKind::Auth,
        });
    }
    for (email, name) in active_subscribers {
        if recipients.iter().any(|r| r.email == email) {
            continue;
        }
        recipients.push(Recipient {
            email,
            name,
            kind: RecipientKind::Subscriber,
        });
    }

    let suppressed: Vec<String> = subscribers::table
        .filter(subscribers::unsubscribed_at.is_not_null())
        .select(subscribers::email)
        .load(conn)?;

    recipients.retain(|r| !suppressed.contains(&r.email));
    Ok(recipients)
}
