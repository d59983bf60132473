mod db;
mod ingest;
mod process;
mod status;
#[cfg(test)]
mod tests;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "smpdb-cli")]
#[command(about = "Social media pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Push a file of raw provider payloads through the ingestion gate
    Ingest {
        /// Source platform (twitter, facebook, tiktok, trends)
        #[arg(long)]
        platform: String,
        /// Path to a JSON file holding an array of raw provider records
        #[arg(long)]
        file: PathBuf,
    },
    /// Drain the processing backlog through the analyzer
    Process {
        /// Restrict the run to one capability (sentiment, location, entity, keyword)
        #[arg(long)]
        capability: Option<String>,
        /// Override the configured number of posts pulled per batch
        #[arg(long)]
        batch_size: Option<i64>,
    },
    /// Show per-capability progress, recent runs, and recent failures
    Status,
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = smpdb_core::load_app_config()?;
    let pool_config = smpdb_db::PoolConfig::from_app_config(&config);
    let pool = smpdb_db::connect_pool(&config.database_url, pool_config).await?;

    match cli.command {
        Commands::Ingest { platform, file } => {
            ingest::run_ingest_file(&pool, &platform, &file).await
        }
        Commands::Process {
            capability,
            batch_size,
        } => process::run_process(&pool, &config, capability.as_deref(), batch_size).await,
        Commands::Status => status::run_status(&pool).await,
        Commands::Db { command } => match command {
            DbCommands::Ping => db::run_ping(&pool).await,
            DbCommands::Migrate => db::run_migrate(&pool).await,
        },
    }
}
