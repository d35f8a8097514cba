mod cmd;
mod output;

use anyhow::Context;
use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;
use woodlink_core::config::Config;

#[derive(Parser)]
#[command(
    name = "woodlink",
    about = "Woodlink donation claims, HTTP server and store maintenance",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (YAML); missing file means defaults
    #[arg(long, global = true, env = "WOODLINK_CONFIG", default_value = "woodlink.yaml")]
    config: PathBuf,

    /// Database file, overrides the config and WOODLINK_DB
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Re-derive item availability from claim status and repair drift
    Reconcile,

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(Some(&cli.config))
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    Ok(config)
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let result = load_config(&cli).and_then(|config| match cli.command {
        Commands::Serve { port } => cmd::serve::run(config, port),
        Commands::Reconcile => cmd::reconcile::run(&config, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&config, subcommand, cli.json),
    });

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
