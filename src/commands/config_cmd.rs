use clap::{Args, Subcommand};
use std::path::Path;

use native_store::Config;

use super::OutputFormat;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config, config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");
                        if config_path.exists() {
                            println!("Config file: {}", config_path.display());
                        } else {
                            println!("Config file: {} (not found)", config_path.display());
                        }
                        println!();
                        println!("port: {}", config.port);
                        println!("database_path: {}", config.database_path.display());
                        println!("collections: {}", config.collections.join(", "));
                        println!("max_connections: {}", config.max_connections);
                        println!("dial_timeout_secs: {}", config.dial_timeout_secs);
                        println!("retry_interval_secs: {}", config.retry_interval_secs);
                        match config.max_dial_attempts {
                            Some(attempts) => println!("max_dial_attempts: {}", attempts),
                            None => println!("max_dial_attempts: unlimited"),
                        }
                        println!("ids_timeout_secs: {}", config.ids_timeout_secs);
                    }
                }
                Ok(())
            }
        }
    }
}
