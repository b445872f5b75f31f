//! `krr config`

use anyhow::Result;
use clap::Subcommand;

use crate::config::{Config, KEYS};
use crate::output::{print_info, print_json, print_success, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the stored defaults
    Show,

    /// Store a default (prometheus-url, username, namespace, format, days)
    Set {
        /// Setting name
        key: String,

        /// New value, empty to clear
        value: String,
    },
}

pub fn run(command: ConfigCommands, config: Config, format: OutputFormat) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let path = Config::config_path()?;
            match format {
                OutputFormat::Json => print_json(&config)?,
                OutputFormat::Table => {
                    print_info(&format!("Config file: {}", path.display()));
                    let show = |value: &Option<String>| {
                        value.clone().unwrap_or_else(|| "(not set)".to_string())
                    };
                    println!("prometheus-url: {}", show(&config.prometheus_url));
                    println!("username:       {}", show(&config.username));
                    println!("namespace:      {}", show(&config.default_namespace));
                    println!("format:         {}", show(&config.default_format));
                    println!(
                        "days:           {}",
                        show(&config.lookback_days.map(|d| d.to_string()))
                    );
                    println!("\nKeys: {}", KEYS.join(", "));
                }
            }
        }
        ConfigCommands::Set { key, value } => {
            let mut config = config;
            config.set(&key, &value)?;
            let path = config.save()?;
            print_success(&format!("Saved {} to {}", key, path.display()));
        }
    }
    Ok(())
}
