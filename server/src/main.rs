use anyhow::Context;
use clap::Parser;
use foodgram_server::config::Config;
use foodgram_server::{api, app, db, telemetry, AppState};
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "foodgram-server", about = "Recipe sharing API server")]
struct Args {
    /// Print the OpenAPI document as JSON and exit
    #[arg(long)]
    openapi: bool,
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.openapi {
        println!("{}", api::openapi().to_pretty_json()?);
        return Ok(());
    }

    let config = Config::from_env()?;
    telemetry::init_telemetry()?;

    let pool: AppState = Arc::new(
        db::create_pool(&config.database_url, config.db_pool_size)
            .context("failed to set up the database")?,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    let local_addr = listener.local_addr()?;

    tracing::info!("Server listening on {}", local_addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", local_addr);
    tracing::info!(
        "OpenAPI spec available at http://{}/api-docs/openapi.json",
        local_addr
    );

    axum::serve(listener, app(pool))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
