pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "prefetch")]
#[command(about = "Prefetch CLI - inspect predictions and manage the persistent page cache")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Predict the next page from a recorded navigation log")]
    Predict(commands::predict::PredictArgs),

    #[command(about = "Persistent cache inspection and cleanup")]
    Cache {
        #[command(subcommand)]
        cmd: commands::cache::CacheCommands,
    },

    #[command(about = "Speculatively fetch URLs into the persistent cache")]
    Fetch(commands::fetch::FetchArgs),

    #[command(about = "Post a prefetch message to a running agent")]
    Send(commands::send::SendArgs),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Predict(args) => commands::predict::handle(args, output_format).await,
        Commands::Cache { cmd } => commands::cache::handle(cmd, output_format).await,
        Commands::Fetch(args) => commands::fetch::handle(args, output_format).await,
        Commands::Send(args) => commands::send::handle(args, output_format).await,
    }
}
