use std::{sync::Arc, time::Duration};

use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use zeroweek::{
    auth::jwt::JwtService,
    clients::{generation::GeminiClient, mailer::ResendMailer},
    config::AppConfig,
    create_router, db, default_handlers,
    scheduler,
    state::AppState,
    Worker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        primary_model = %config.generation_model_primary,
        "loaded configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
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

    let bind_addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config, mailer, generator, http, jwt);
    let shared = Arc::new(state.clone());

    let app = create_router(state);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");

    let worker = Worker::new(shared.clone(), default_handlers(), Duration::from_secs(2));

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = worker.run() => {}
        _ = scheduler::run(shared) => {}
        _ = signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
