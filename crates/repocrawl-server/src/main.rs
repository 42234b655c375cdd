mod api;

use repocrawl_notify::SmtpMonitorMailer;
use repocrawl_startup::StartupSequencer;
use repocrawl_tasks::CatalogLoader;
use tracing_subscriber::EnvFilter;

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = repocrawl_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(env = %config.env, boot_mode = ?config.boot_mode, "starting repocrawl server");

    let pool_config = repocrawl_db::PoolConfig::from_app_config(&config);
    let pool = repocrawl_db::connect_pool(&config.database_url, pool_config).await?;
    repocrawl_db::run_migrations(&pool).await?;

    let tasks = CatalogLoader::new(&config.tasks_path);
    let mailer = SmtpMonitorMailer::new(config.mail.clone(), config.env);
    let outcome = StartupSequencer::new(&tasks, &pool, &mailer)
        .run(&config.boot_mode)
        .await?;

    let app = build_app(AppState {
        pool,
        startup: outcome.phase(),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
