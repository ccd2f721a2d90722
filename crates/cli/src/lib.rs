pub mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use qbrgen_core::config::{AppConfig, ConfigOverrides, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "qbrgen",
    about = "QBR generation operator CLI",
    long_about = "Generate quarterly business reviews from customer records, with an \
                  independent model review pass and bounded regeneration.",
    after_help = "Examples:\n  qbrgen generate --input accounts.json --account \"Initech\"\n  \
                  qbrgen batch --input accounts.json --out-dir reports\n  qbrgen config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to qbrgen.toml (defaults to the working directory)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Override the generator model name")]
    model: Option<String>,

    #[arg(long, global = true, help = "Override the judge model name")]
    judge_model: Option<String>,

    #[arg(long, global = true, help = "Override the regeneration budget")]
    retry_budget: Option<u32>,

    #[arg(long, global = true, help = "Override the log level (trace|debug|info|warn|error)")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Generate the QBR for one account from a records file")]
    Generate {
        #[arg(long, help = "JSON file holding an array of customer records")]
        input: PathBuf,
        #[arg(long, help = "Account name to generate for")]
        account: String,
        #[arg(long, default_value = "reports", help = "Directory for markdown artifacts")]
        out_dir: PathBuf,
    },
    #[command(about = "Generate QBRs for every record in a file, bounded-concurrently")]
    Batch {
        #[arg(long, help = "JSON file holding an array of customer records")]
        input: PathBuf,
        #[arg(long, default_value = "reports", help = "Directory for markdown artifacts")]
        out_dir: PathBuf,
    },
    #[command(about = "Inspect effective configuration values with secrets redacted")]
    Config,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        model: cli.model,
        judge_model: cli.judge_model,
        retry_budget: cli.retry_budget,
        log_level: cli.log_level,
        ..ConfigOverrides::default()
    };
    let config = AppConfig::load(LoadOptions {
        config_path: cli.config,
        require_file: false,
        overrides,
    })?;
    init_logging(&config);

    match cli.command {
        Command::Generate { input, account, out_dir } => {
            commands::generate::run(&config, &input, &account, &out_dir).await
        }
        Command::Batch { input, out_dir } => {
            commands::batch::run(&config, &input, &out_dir).await
        }
        Command::Config => {
            println!("{}", commands::config::render(&config));
            Ok(())
        }
    }
}

fn init_logging(config: &AppConfig) {
    use qbrgen_core::config::LogFormat::{Compact, Json, Pretty};
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}
