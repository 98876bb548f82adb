//! Tollgate CLI - command-line interface for the Tollgate gateway.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tollgate_core::config::LogFormat;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tollgate")]
#[command(about = "Tollgate - API key gateway for OpenAI-compatible backends")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (default: ~/.tollgate/tollgate.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway server
    Run {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (overrides the configured mode)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Check configuration, secret store, and gateway health
    Check {
        /// Probe the store and a running gateway for connectivity
        #[arg(long)]
        deep: bool,
    },

    /// Configuration inspection
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration (secrets redacted)
    Show,

    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;

    // Setup logging
    let filter = if cli.verbose || config.settings.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    match config.settings.log_format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(false))
                .with(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .init();
        }
    }

    // No subcommand starts the gateway with configured settings.
    let command = cli.command.unwrap_or(Commands::Run {
        port: None,
        bind: None,
    });

    match command {
        Commands::Run { port, bind } => {
            let args = commands::serve::ServeArgs { port, bind };
            commands::run_serve(args, config).await?;
        }

        Commands::Check { deep } => {
            let args = commands::check::CheckArgs { deep };
            commands::run_check(args, config).await?;
        }

        Commands::Config { action } => {
            let args = match action {
                Some(ConfigCommands::Validate) => commands::config::ConfigArgs {
                    show: false,
                    validate: true,
                },
                Some(ConfigCommands::Show) | None => commands::config::ConfigArgs {
                    show: true,
                    validate: false,
                },
            };
            commands::run_config(args, config)?;
        }
    }

    Ok(())
}
