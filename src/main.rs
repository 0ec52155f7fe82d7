use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yeyak::captcha::PromptTokenProvider;
use yeyak::config::Config;
use yeyak::driver::RunDriver;
use yeyak::engine::Engine;
use yeyak::error::Error;
use yeyak::locations::TerminalPrompt;

#[derive(Parser)]
#[command(
    name = "yeyak",
    version,
    about = "Appointment slot watcher and booking engine",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the configured locations and book the first matching slot
    Run,

    /// Resolve and print candidate locations, then exit
    Locations,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = setup_tracing(&cli.log_format, cli.verbose, &config.logging.level) {
        eprintln!("failed to initialize logging: {e:#}");
        std::process::exit(1);
    }

    if let Err(e) = config.validate() {
        tracing::error!(error = %format!("{e:#}"), "invalid configuration");
        std::process::exit(1);
    }

    if let Err(e) = execute(cli.command, config).await {
        let code = e.exit_code();
        if code == 0 {
            tracing::warn!(reason = %e, "stopping");
        } else {
            tracing::error!(error = %e, "exiting");
        }
        std::process::exit(code);
    }
}

async fn execute(command: Commands, config: Config) -> yeyak::error::Result<()> {
    let engine = Engine::new(
        config.clone(),
        Arc::new(PromptTokenProvider),
        Arc::new(TerminalPrompt),
    )?;

    match command {
        Commands::Run => {
            tracing::info!("yeyak starting");
            let driver = RunDriver::new(Arc::new(engine), config.check_interval());
            let confirmation = driver.run().await?;

            println!("Booked: {}", confirmation.location_name);
            println!("  starts at     {}", confirmation.slot.start);
            println!("  confirmation  {}", confirmation.confirmation_number);
            println!("  details       {}", confirmation.confirmation_url);
        }

        Commands::Locations => {
            let locations = engine.list_locations().await?;
            if locations.is_empty() {
                println!("No candidate locations found.");
                return Err(Error::from(yeyak::error::FatalError::NoLocationsFound));
            }
            for location in locations {
                println!("{:>6}  {}", location.id, location);
            }
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool, configured_level: &str) -> Result<()> {
    let level = if verbose { "debug" } else { configured_level };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .try_init()?;
        }
    }

    Ok(())
}
