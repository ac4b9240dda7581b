mod commands;

use clap::{Parser, Subcommand};
use stackwire_config::Settings;
use stackwire_core::Profile;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackwire")]
#[command(about = "Compose and provision a multi-tier cloud deployment", long_about = None)]
struct Cli {
    /// Settings file (skips discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision every component and print the deployment outputs
    Deploy {
        /// Deployment profile (staging, production)
        #[arg(short, long, env = "STACKWIRE_PROFILE", default_value = "staging")]
        profile: Profile,
        /// Service image tag to deploy
        #[arg(long, env = "STACKWIRE_VERSION", default_value = "latest")]
        version: String,
        /// Write the outputs as JSON to this file
        #[arg(short, long)]
        outputs: Option<PathBuf>,
    },
    /// Show the instantiation order and sizing without provisioning anything
    Plan {
        /// Deployment profile (staging, production)
        #[arg(short, long, env = "STACKWIRE_PROFILE", default_value = "staging")]
        profile: Profile,
    },
    /// Print the capacity table
    Capacity,
    /// Show version information
    Version,
}

fn load_settings(path: Option<PathBuf>) -> anyhow::Result<Settings> {
    let settings = match path {
        Some(path) => {
            let settings = Settings::from_path(&path)?.with_env_overrides();
            settings.validate()?;
            settings
        }
        None => stackwire_config::load_settings()?,
    };
    tracing::debug!(stack = %settings.stack_name, region = %settings.region, "settings loaded");
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Version => {
            println!("stackwire {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Capacity => {
            commands::capacity::handle();
        }
        Commands::Plan { profile } => {
            let settings = load_settings(cli.config)?;
            commands::plan::handle(settings, profile)?;
        }
        Commands::Deploy {
            profile,
            version,
            outputs,
        } => {
            let settings = load_settings(cli.config)?;
            commands::deploy::handle(settings, profile, &version, outputs.as_deref()).await?;
        }
    }

    Ok(())
}
