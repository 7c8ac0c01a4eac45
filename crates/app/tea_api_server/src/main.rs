//! Tea API server binary.
//!
//! Serves the authentication API over PostgreSQL until interrupted.

use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tea_api::AppState;
use tea_api::config::ApiConfig;
use tea_core::auth::queries::PgUserStore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "tea_api_server", about = "Tea API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:3100")]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/tea"
    )]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,tea_api=debug,tea_core=debug")
            }),
        )
        .init();

    let args = Args::parse();

    info!(
        bind_addr = %args.bind_addr,
        max_connections = args.max_connections,
        "starting tea_api_server"
    );

    let config = ApiConfig {
        bind_addr: args.bind_addr,
        pg_connection_url: args.database_url,
        ..ApiConfig::from_env()
    };

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    tea_api::migrate(&pool).await?;

    if config.bot_token.is_empty() {
        warn!("TELEGRAM_BOT_TOKEN is not set; every login will be refused");
    }
    if !config.cookie.secure {
        warn!("refresh cookie is issued without the Secure attribute");
    }

    let state = AppState {
        store: Arc::new(PgUserStore::new(pool.clone())),
        config: config.clone(),
    };
    let app = tea_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "REST API listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received, shutting down");
                    shutdown.cancel();
                }
                Err(e) => warn!(error = %e, "could not listen for ctrl-c"),
            }
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    pool.close().await;
    info!("server stopped");
    Ok(())
}
