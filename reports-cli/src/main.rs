//! Main entry point for the Usage Reports CLI.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;

mod commands;
mod logging;

/// Usage Reports CLI
#[derive(Parser, Debug)]
#[command(name = "reports", version)]
#[command(
    about = "Sign in through Keycloak and view usage reports",
    long_about = None
)]
struct Cli {
    /// Path to the configuration file (optional)
    #[arg(
        long,
        short,
        global = true,
        help = "Path to the configuration file (e.g., config.yaml or config.json). If not provided, defaults and REPORTS_* variables are used."
    )]
    config: Option<PathBuf>,

    /// Report API base URL, overriding the file and environment
    #[arg(
        long,
        global = true,
        help = "Base URL of the report API (e.g., http://localhost:8000). Overrides the configuration file and REPORTS_API_URL."
    )]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the Usage Reports CLI
#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in through the identity provider (authorization code + PKCE)
    Login,

    /// Sign out and forget the stored session
    Logout,

    /// Show the current session
    Status,

    /// Fetch and display the usage report
    Report(commands::report::ReportArgs),

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script
        #[arg(
            long,
            short,
            help = "The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)"
        )]
        shell: clap_complete::Shell,
    },

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml or json). Defaults to yaml.
        #[arg(
            long,
            short,
            help = "Format of the configuration file to generate (yaml or json). Defaults to yaml."
        )]
        format: Option<String>,

        /// Where to write the file
        #[arg(
            long,
            short,
            help = "Output path for the generated file. Defaults to config.yaml or config.json in the current directory."
        )]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
        }
        Commands::Config { format, output } => {
            let format = format.unwrap_or_else(|| "yaml".to_string());
            commands::config::generate_config(&format, output)?;
        }
        Commands::Login => {
            let config = commands::load(cli.config, cli.api_url)?;
            commands::session::login(&config).await?;
        }
        Commands::Logout => {
            let config = commands::load(cli.config, cli.api_url)?;
            commands::session::logout(&config).await?;
        }
        Commands::Status => {
            let config = commands::load(cli.config, cli.api_url)?;
            commands::session::status(&config)?;
        }
        Commands::Report(args) => {
            let config = commands::load(cli.config, cli.api_url)?;
            commands::report::run(&config, args).await?;
        }
    }

    Ok(())
}
