//! `callwire` binary: SIP trunk provisioning, outbound calls and the voice
//! agent worker, with structured logging and graceful shutdown on
//! SIGTERM/SIGINT.

use callwire_cli::commands::{self, describe_inbound, describe_trunk, CommandError};
use callwire_cli::config::{self, ConfigSource, DEFAULT_CONFIG_PATH};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "callwire", version, about = "LiveKit SIP calls through a Twilio trunk, answered by an AI agent", long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, env = "CALLWIRE_CONFIG_PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Create the outbound trunk, then call SIP_CALL_TO (default)
    Call,
    /// Call SIP_CALL_TO through the existing trunk SIP_TRUNK_ID
    Dial,
    /// Create the outbound trunk only
    Trunk,
    /// Create the inbound trunk and the dispatch rule for the agent
    Setup,
    /// Run the voice agent worker
    Agent,
}

async fn run(command: Command, config: &config::Config) -> Result<(), CommandError> {
    match command {
        Command::Call => {
            let placed = commands::outbound_call(config).await?;
            println!("{}", describe_trunk(&placed.trunk));
            println!("Call placed successfully!\n{}", placed.call);
        }
        Command::Dial => {
            let call = commands::dial(config).await?;
            println!("Call placed successfully!\n{}", call);
        }
        Command::Trunk => {
            let outcome = commands::create_trunk(config).await?;
            println!("{}", describe_trunk(&outcome));
        }
        Command::Setup => {
            let outcome = commands::setup(config).await?;
            println!("{}", describe_inbound(&outcome));
        }
        Command::Agent => commands::agent(config, shutdown_signal()).await?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config_source = if cli.config.is_some() {
        "cli-arg"
    } else {
        "default"
    };
    let config_path = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

    let (config, loaded_from) = match config::load_config_with_source(Some(config_path)) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::debug!(
        source = config_source,
        path = config_path,
        "resolved configuration path"
    );
    if loaded_from == ConfigSource::Defaults {
        tracing::debug!(path = config_path, "config file not found, using defaults");
    }

    let command = cli.command.unwrap_or(Command::Call);
    match run(command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(command = ?command, "command failed");
            eprintln!("{}", e.report());
            ExitCode::FAILURE
        }
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, shutting down agent worker"); }
        () = terminate => { tracing::info!("received SIGTERM, shutting down agent worker"); }
    }
}
