use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{ConfigCommand, ContentCommand, StoreCommand};
use native_store::{Config, Db, Gateway};

#[derive(Parser)]
#[command(name = "native-store")]
#[command(version)]
#[command(about = "Administration tool for the native store", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true, env = "NATIVE_STORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read and write native content
    Content(ContentCommand),

    /// Inspect and prepare the document store
    Store(StoreCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "native_store=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let config = Config::load(Some(config_path.clone()))?;

    match cli.command {
        Some(Commands::Content(cmd)) => {
            let db = connect(&config);
            db.open().await?;
            cmd.run(&Gateway::new(db)).await?;
        }
        Some(Commands::Store(cmd)) => {
            let db = connect(&config);
            cmd.run(&db).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config, &config_path)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

/// Single dial attempt, no retry loop.
fn connect(config: &Config) -> Db {
    let mut settings = config.db_settings();
    settings.max_dial_attempts = Some(1);
    Db::connect(settings)
}
