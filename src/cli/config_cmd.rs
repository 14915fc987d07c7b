//! Config command - manage searchbench client settings

use clap::{Args, Subcommand};

use crate::config::Settings;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show effective settings, including command-line overrides
    Show,

    /// Initialize settings file with defaults
    Init {
        /// Overwrite existing settings
        #[arg(short, long)]
        force: bool,
    },

    /// Show settings file path
    Path,
}

pub async fn run(args: ConfigArgs, settings: &Settings) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let path = Settings::config_path();

            if path.exists() {
                println!("Settings file: {}", path.display());
            } else {
                println!("Settings file: {} (not found, using defaults)", path.display());
            }
            println!();
            print!("{}", toml::to_string_pretty(settings)?);
        }

        ConfigCommands::Init { force } => {
            let path = Settings::config_path();

            if !Settings::write_example(force)? {
                anyhow::bail!(
                    "Settings file already exists at {}. Use --force to overwrite.",
                    path.display()
                );
            }

            println!("Created settings file at {}", path.display());
            println!();
            println!("Edit [backend] to point at the engine under test, e.g.:");
            println!();
            println!("  kind = \"infinity\"");
            println!("  address = \"http://127.0.0.1:23820\"");
        }

        ConfigCommands::Path => {
            println!("{}", Settings::config_path().display());
        }
    }

    Ok(())
}
