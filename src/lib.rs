pub mod auth;
pub mod clients;
pub mod config;
pub mod db;
pub mod digest;
pub mod diversity;
pub mod emails;
pub mod error;
pub mod jobs;
pub mod ledger;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod schema;
pub mod scrape;
pub mod state;
pub mod store;
pub mod subscribers;
pub mod synthesize;
pub mod week;
pub mod winner;
pub mod workers;

pub use routes::create_router;
pub use workers::{default_handlers, JobExecution, JobHandler, Worker};
