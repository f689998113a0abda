use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gridiron",
    about = "NFL weekly-stats ETL and fantasy point prediction service",
    version
)]
pub struct Cli {
    /// Configuration directory
    #[arg(short, long, default_value = "config")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP serving layer (bootstraps the store when empty)
    Serve {
        /// Listen port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the ingestion pipeline once and exit
    Etl {
        /// Import a pre-existing directory of CSV drops instead of the
        /// configured source (migration between deployments)
        #[arg(long, value_name = "DIR")]
        import: Option<PathBuf>,
    },
    /// Print one player's projection as JSON
    Predict {
        player_id: String,
        /// Target week; defaults to the first upcoming week
        #[arg(short, long)]
        week: Option<i32>,
    },
}
