use std::collections::{HashSet, VecDeque};
use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use chrono::{NaiveDate, Weekday};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;
use zeroweek::auth::jwt::JwtService;
use zeroweek::clients::generation::{GenerationError, TextGenerator};
use zeroweek::clients::mailer::{Mailer, OutboundEmail};
use zeroweek::config::AppConfig;
use zeroweek::db::{self, PgPool};
use zeroweek::models::{NewAccount, NewIdea};
use zeroweek::routes;
use zeroweek::state::AppState;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const ADMIN_PASSWORD: &str = "test-admin-password";
#[allow(dead_code)]
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Records every send; addresses registered through `fail_for` bounce.
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeMailer {
    pub async fn fail_for(&self, email: &str) {
        self.failing.lock().await.insert(email.to_string());
    }

    pub async fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().await.clone()
    }

    #[allow(dead_code)]
    pub async fn sent_to(&self, email: &str) -> Vec<OutboundEmail> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|msg| msg.to == email)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<()> {
        if self.failing.lock().await.contains(&email.to) {
            return Err(anyhow!("simulated delivery failure for {}", email.to));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

/// Returns scripted responses in order; empty script means rate-limited.
#[derive(Default)]
pub struct FakeGenerator {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
}

impl FakeGenerator {
    #[allow(dead_code)]
    pub async fn push_response(&self, text: &str) {
        self.responses
            .lock()
            .await
            .push_back(Ok(text.to_string()));
    }

    #[allow(dead_code)]
    pub async fn push_failure(&self, error: GenerationError) {
        self.responses.lock().await.push_back(Err(error));
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, GenerationError> {
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or(Err(GenerationError::RateLimited))
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    mailer: Arc<FakeMailer>,
    #[allow(dead_code)]
    generator: Arc<FakeGenerator>,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url: database_url.clone(),
            database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "test-issuer".to_string(),
            jwt_audience: "test-audience".to_string(),
            admin_password: ADMIN_PASSWORD.to_string(),
            admin_email: Some(ADMIN_EMAIL.to_string()),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            cors_allowed_origin: None,
            generation_api_key: "test-generation-key".to_string(),
            generation_model_primary: "primary-model".to_string(),
            generation_model_backup: "backup-model".to_string(),
            mail_api_key: "test-mail-key".to_string(),
            mail_from: "Test <test@example.com>".to_string(),
            mail_reply_to: None,
            scrape_weekday: Weekday::Sun,
            scrape_hour_utc: 10,
            publish_weekday: Weekday::Mon,
            publish_hour_utc: 9,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let mailer = Arc::new(FakeMailer::default());
        let generator = Arc::new(FakeGenerator::default());
        let jwt = JwtService::from_config(&config);
        let state = AppState::new(
            pool.clone(),
            config,
            mailer.clone(),
            generator.clone(),
            reqwest::Client::new(),
            jwt,
        );
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            mailer,
            generator,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(|conn| truncate_all(conn)).await
    }

    pub fn mailer(&self) -> Arc<FakeMailer> {
        self.mailer.clone()
    }

    #[allow(dead_code)]
    pub fn generator(&self) -> Arc<FakeGenerator> {
        self.generator.clone()
    }

    pub async fn insert_account(&self, email: &str, name: Option<&str>) -> Result<Uuid> {
        let email = email.to_string();
        let name = name.map(str::to_string);
        self.with_conn(move |conn| {
            let account = NewAccount {
                id: Uuid::new_v4(),
                email,
                display_name: name,
            };
            diesel::insert_into(zeroweek::schema::accounts::table)
                .values(&account)
                .execute(conn)
                .context("failed to insert account")?;
            Ok(account.id)
        })
        .await
    }

    pub fn token_for(&self, user_id: Uuid, email: &str) -> Result<String> {
        self.state.jwt.generate_token(user_id, email)
    }

    pub async fn insert_idea(
        &self,
        name: &str,
        week: NaiveDate,
        status: &str,
    ) -> Result<Uuid> {
        let name = name.to_string();
        let status = status.to_string();
        self.with_conn(move |conn| {
            let idea = NewIdea {
                id: Uuid::new_v4(),
                name: name.clone(),
                title: name.clone(),
                problem: format!("{name} has a problem worth solving"),
                solution: format!("{name} solves it"),
                target_audience: "builders".to_string(),
                why_it_matters: "it matters".to_string(),
                tags: serde_json::json!({ "region": "Global", "category": "SaaS" }),
                source_links: serde_json::json!([]),
                week_published: week,
                status,
                moderation_notes: None,
                problem_keywords: serde_json::json!([]),
                batch_id: Some("test-batch".to_string()),
            };
            diesel::insert_into(zeroweek::schema::ideas::table)
                .values(&idea)
                .execute(conn)
                .context("failed to insert idea")?;
            Ok(idea.id)
        })
        .await
    }

    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.request(Method::POST, path, Some(payload), token, &[])
            .await
    }

    #[allow(dead_code)]
    pub async fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.request(Method::PUT, path, Some(payload), token, &[])
            .await
    }

    #[allow(dead_code)]
    pub async fn put_with_headers<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        headers: &[(&str, &str)],
    ) -> Result<hyper::Response<Body>> {
        self.request(Method::PUT, path, Some(payload), None, headers)
            .await
    }

    pub async fn post_with_headers<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        headers: &[(&str, &str)],
    ) -> Result<hyper::Response<Body>> {
        self.request(Method::POST, path, Some(payload), None, headers)
            .await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.request::<()>(Method::GET, path, None, token, &[])
            .await
    }

    pub async fn get_with_headers(
        &self,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<hyper::Response<Body>> {
        self.request::<()>(Method::GET, path, None, None, headers)
            .await
    }

    async fn request<T: serde::Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&T>,
        token: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match payload {
            Some(payload) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(payload)?))?,
            None => builder.body(Body::empty())?,
        };
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE user_badges, votes, weekly_batches, ideas, subscribers, accounts, jobs RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
