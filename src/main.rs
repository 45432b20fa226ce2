/// GradAid - graduate school application tracker
///
/// Tracks a user's applications and their documents, meters AI document
/// generation with a credit ledger, and serves the catalog search.

mod activity;
mod api;
mod applications;
mod auth;
mod catalog;
mod config;
mod context;
mod credits;
mod dashboard;
mod db;
mod documents;
mod error;
mod favorites;
mod feedback;
mod generation;
mod jobs;
mod metrics;
mod ownership;
mod profiles;
mod rate_limit;
mod search;
mod server;
mod users;

use config::ServerConfig;
use context::AppContext;
use error::AppResult;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gradaid=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();
    metrics::mark_started();

    let config = ServerConfig::from_env()?;

    let ctx = Arc::new(AppContext::new(config).await?);

    // Start background jobs
    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   ______               ___    _     __
  / ____/________ _____/ / |  (_)___/ /
 / / __/ ___/ __ `/ __  / /| | / / __  /
/ /_/ / /  / /_/ / /_/ / ___ |/ / /_/ /
\____/_/   \__,_/\__,_/_/  |_/_/\__,_/

        Graduate Application Tracker v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
