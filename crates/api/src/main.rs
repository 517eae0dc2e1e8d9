use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use autobids_api::commands::{self, BatchJob, Cli, Command};
use autobids_api::config::ServerConfig;
use autobids_api::router::build_app_router;
use autobids_api::state::AppState;
use autobids_core::process::SystemRunner;
use autobids_db::DbPool;
use autobids_events::{EmailConfig, EmailDelivery};
use autobids_pipeline::{Pipeline, ToolConfig};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "autobids_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = autobids_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    autobids_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    autobids_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    match cli.command {
        Command::Serve => serve(pool).await,
        Command::CheckPis => {
            let pipeline = build_pipeline(pool);
            match pipeline.refresh_principals().await {
                Ok(names) => tracing::info!(count = names.len(), "Principal names refreshed"),
                // A DICOM outage keeps the previous names.
                Err(e) => tracing::error!(error = %e, "Could not refresh principal names"),
            }
            Ok(())
        }
        Command::UpdateHeuristics => {
            let task_id = commands::queue_update_heuristics(&pool).await?;
            tracing::info!(task_id, "Heuristics update queued");
            Ok(())
        }
        Command::RunAllCfmm2tar => run_all(&pool, BatchJob::Cfmm2tar).await,
        Command::RunAllTar2bids => run_all(&pool, BatchJob::Tar2bids).await,
        Command::RunAllArchive => run_all(&pool, BatchJob::Archive).await,
        Command::CreateAdmin(args) => {
            let user = commands::create_admin(&pool, &args.email, &args.password).await?;
            tracing::info!(user_id = user.id, email = %user.email, "Admin account ready");
            Ok(())
        }
    }
}

fn build_pipeline(pool: DbPool) -> Pipeline<SystemRunner> {
    let email = EmailConfig::from_env().map(EmailDelivery::new);
    if email.is_none() {
        tracing::warn!("SMTP_HOST not set, emails disabled");
    }
    Pipeline::new(pool, ToolConfig::from_env(), SystemRunner, email)
}

async fn run_all(pool: &DbPool, job: BatchJob) -> anyhow::Result<()> {
    let queued = commands::run_all(pool, job).await?;
    tracing::info!(?job, studies = ?queued, "Done");
    Ok(())
}

async fn serve(pool: DbPool) -> anyhow::Result<()> {
    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let addr = SocketAddr::new(
        config.host.parse().context("Invalid HOST address")?,
        config.port,
    );

    // --- App state ---
    let state = AppState {
        pipeline: Arc::new(build_pipeline(pool.clone())),
        pool,
        config: Arc::new(config),
    };
    let app = build_app_router(state);

    // --- Start server ---
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
