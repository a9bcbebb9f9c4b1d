use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod common;
mod server;

use commands::{LoginCommand, ServerCommand};
use common::config::{IamLoginConfig, LoggingConfig};

#[derive(Parser)]
#[command(
    name = "iam-login",
    about = "IAM login - authenticate AWS principals with signed STS GetCallerIdentity requests",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the login server
    Server(ServerCommand),
    /// Sign a GetCallerIdentity request with local AWS credentials and log in
    Login(LoginCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Force stdout to be line buffered
    let _ = io::stdout().flush();

    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Server(args) => match &args.config {
            Some(path) => IamLoginConfig::load(path)?,
            None => IamLoginConfig::default(),
        },
        Commands::Login(_) => IamLoginConfig::default(),
    };

    init_logging(&cli, &config.logging);

    print_banner();

    match cli.command {
        Commands::Server(server_cmd) => {
            info!("Starting IAM login server");
            server::run(server_cmd, config).await?;
        }
        Commands::Login(login_cmd) => {
            info!("Starting IAM login client");
            client::run(login_cmd).await?;
        }
    }

    Ok(())
}

/// Flag wins over `RUST_LOG`, which wins over the config file
fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else if let Some(level) = &cli.log_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn print_banner() {
    println!();
    println!("🔐 IAM Login");
    println!();
    let _ = io::stdout().flush();
}
