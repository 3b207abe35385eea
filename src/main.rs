/// Recipes Manager
///
/// Backend for a personal recipe collection: Keycloak sign-in through the
/// OpenID Connect authorization code flow, recipe storage, and import of
/// recipes exported from Google Drive.

mod account;
mod api;
mod auth;
mod config;
mod context;
mod db;
mod error;
mod jobs;
mod recipes;
mod server;
mod sources;

#[cfg(test)]
mod test_utils;

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
                .unwrap_or_else(|_| "recipes_manager=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let config = ServerConfig::from_env()?;
    tracing::debug!("Log filter: {}", config.logging.level);

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
     ____           _
    |  _ \ ___  ___(_)_ __   ___  ___
    | |_) / _ \/ __| | '_ \ / _ \/ __|
    |  _ <  __/ (__| | |_) |  __/\__ \
    |_| \_\___|\___|_| .__/ \___||___/
                     |_|
        Recipes Manager v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
