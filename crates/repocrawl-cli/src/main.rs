use clap::{Parser, Subcommand};
use repocrawl_core::{AppConfig, BootMode};
use repocrawl_notify::SmtpMonitorMailer;
use repocrawl_startup::{StartupOutcome, StartupSequencer};
use repocrawl_tasks::{CatalogLoader, TaskLoader};

#[derive(Debug, Parser)]
#[command(name = "repocrawl-cli")]
#[command(about = "repocrawl operator command line")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the startup hook now, as a cold boot would.
    Init {
        /// Run even when APP_START_FROM is set.
        #[arg(long)]
        force: bool,
    },
    /// List enabled collections and their setting ids.
    Collections,
    /// Show one collection, enabled or not.
    Collection {
        /// Collection slug.
        slug: String,
    },
    /// List tasks defined in the task catalog.
    Tasks,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = repocrawl_core::load_app_config()?;

    match cli.command {
        Commands::Init { force } => run_init(&config, force).await,
        Commands::Collections => list_collections(&config).await,
        Commands::Collection { slug } => show_collection(&config, &slug).await,
        Commands::Tasks => list_tasks(&config),
    }
}

fn effective_boot_mode(config: &AppConfig, force: bool) -> BootMode {
    if force {
        BootMode::Cold
    } else {
        config.boot_mode.clone()
    }
}

async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = repocrawl_db::PoolConfig::from_app_config(config);
    Ok(repocrawl_db::connect_pool(&config.database_url, pool_config).await?)
}

async fn run_init(config: &AppConfig, force: bool) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let tasks = CatalogLoader::new(&config.tasks_path);
    let mailer = SmtpMonitorMailer::new(config.mail.clone(), config.env);

    let outcome = StartupSequencer::new(&tasks, &pool, &mailer)
        .run(&effective_boot_mode(config, force))
        .await?;

    tracing::info!(phase = %outcome.phase(), "startup hook finished");
    match outcome {
        StartupOutcome::Skipped { start_from } => {
            println!("skipped: APP_START_FROM={start_from:?} (use --force to run anyway)");
        }
        StartupOutcome::Completed(report) => {
            println!(
                "done: {} succeeded, {} failed, mail {}",
                report.succeeded.len(),
                report.failed.len(),
                if report.mail_sent { "sent" } else { "not sent" }
            );
            for failure in &report.failed {
                println!(
                    "  collection {} (setting {}): {}",
                    failure.collection_id,
                    setting_label(failure.setting_id),
                    failure.reason
                );
            }
        }
    }
    Ok(())
}

async fn list_collections(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let rows = repocrawl_db::list_enabled_collections(&pool).await?;
    tracing::info!(count = rows.len(), "listed enabled collections");
    for row in rows {
        println!(
            "{}\t{}\t{}\tsetting={}",
            row.id,
            row.slug,
            row.name,
            setting_label(row.setting_id)
        );
    }
    Ok(())
}

async fn show_collection(config: &AppConfig, slug: &str) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let row = match repocrawl_db::get_collection_by_slug(&pool, slug).await {
        Ok(row) => row,
        Err(repocrawl_db::DbError::NotFound) => anyhow::bail!("no collection with slug {slug:?}"),
        Err(e) => return Err(e.into()),
    };
    tracing::info!(collection_id = row.id, slug, "loaded collection");
    println!("id:      {}", row.id);
    println!("name:    {}", row.name);
    println!("enabled: {}", row.enabled);
    println!("setting: {}", setting_label(row.setting_id));
    Ok(())
}

fn setting_label(setting_id: Option<i64>) -> String {
    setting_id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

fn list_tasks(config: &AppConfig) -> anyhow::Result<()> {
    let registry = CatalogLoader::new(&config.tasks_path).load()?;
    tracing::info!(
        path = %config.tasks_path.display(),
        count = registry.len(),
        "loaded task catalog"
    );
    for name in registry.names() {
        println!("{name}");
    }
    Ok(())
}
