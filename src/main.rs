use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use reelsmith::server::{ServerConfig, start_server};

#[derive(Parser)]
#[command(name = "reelsmith")]
#[command(version, about = "AI-backed video production orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline control server
    Serve {
        /// Port to serve on
        #[arg(short, long, default_value = "4170")]
        port: u16,

        /// Database path
        #[arg(long, default_value = ".reelsmith/projects.db")]
        db_path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelsmith=info".into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port, db_path } => start_server(ServerConfig { port, db_path }).await,
    }
}
